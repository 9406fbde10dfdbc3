//! HTTP clients for the external collaborators of the ledger: the VTpass
//! electricity biller and the Paystack payment gateway.

use std::time::Duration;

use reqwest::Url;

mod paystack;
mod vtpass;

pub use paystack::{PaystackConfig, PaystackGateway};
pub use vtpass::{VtpassBiller, VtpassConfig};

/// Construction failures for a provider client.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Parses a provider base URL, making sure it ends with `/` so that
/// `Url::join` appends to the path instead of replacing its last segment.
pub(crate) fn base_url(raw: &str) -> Result<Url, ProviderError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&with_slash).map_err(|err| ProviderError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: err.to_string(),
    })
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_keeps_the_path_prefix() {
        let url = base_url("https://sandbox.vtpass.com/api").unwrap();
        assert_eq!(
            url.join("pay").unwrap().as_str(),
            "https://sandbox.vtpass.com/api/pay"
        );
        let url = base_url("https://sandbox.vtpass.com/api/").unwrap();
        assert_eq!(
            url.join("merchant-verify").unwrap().as_str(),
            "https://sandbox.vtpass.com/api/merchant-verify"
        );
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(matches!(
            base_url("not a url"),
            Err(ProviderError::InvalidBaseUrl { .. })
        ));
    }
}
