//! Paystack checkout initialization.

use async_trait::async_trait;
use engine::{CheckoutRequest, CheckoutSession, Gateway, GatewayError};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ProviderError, base_url, http_client};

#[derive(Clone, Debug, Deserialize)]
pub struct PaystackConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Used both as API bearer token and as webhook signing key.
    pub secret_key: String,
    pub callback_url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.paystack.co".to_string()
}

fn default_timeout() -> u64 {
    15
}

#[derive(Debug, Clone)]
pub struct PaystackGateway {
    base_url: Url,
    secret_key: String,
    callback_url: Option<String>,
    http: reqwest::Client,
}

impl PaystackGateway {
    pub fn new(config: &PaystackConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url(&config.base_url)?,
            secret_key: config.secret_key.clone(),
            callback_url: config.callback_url.clone(),
            http: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Gateway for PaystackGateway {
    async fn initialize(&self, checkout: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let endpoint = self
            .base_url
            .join("transaction/initialize")
            .map_err(|err| GatewayError::Unavailable(format!("invalid endpoint: {err}")))?;
        let mut payload = json!({
            "email": checkout.email,
            "amount": checkout.amount_minor,
            "reference": checkout.reference,
            "metadata": {"account_id": checkout.account_id},
        });
        if let Some(callback_url) = &self.callback_url {
            payload["callback_url"] = Value::String(callback_url.clone());
        }

        let res = self
            .http
            .post(endpoint)
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(|err| GatewayError::Unavailable(err.to_string()))?;
        let status = res.status();
        let raw = res
            .json::<Value>()
            .await
            .map_err(|err| GatewayError::Unavailable(format!("http {status}: {err}")))?;
        if status.is_server_error() {
            return Err(GatewayError::Unavailable(format!("http {status}")));
        }
        interpret_initialize(&raw)
    }
}

pub(crate) fn interpret_initialize(raw: &Value) -> Result<CheckoutSession, GatewayError> {
    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    if raw.get("status").and_then(Value::as_bool) != Some(true) {
        return Err(GatewayError::Rejected(message.to_string()));
    }
    let data = raw.get("data");
    let authorization_url = data
        .and_then(|d| d.get("authorization_url"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| GatewayError::Rejected(format!("no authorization_url: {message}")))?;
    Ok(CheckoutSession {
        authorization_url: authorization_url.to_string(),
        access_code: data
            .and_then(|d| d.get("access_code"))
            .and_then(Value::as_str)
            .map(ToString::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_returns_the_checkout_url() {
        let raw = json!({
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/0peioxfhpn",
                "access_code": "0peioxfhpn",
                "reference": "epay_1_abcdef01"
            }
        });
        let session = interpret_initialize(&raw).unwrap();
        assert_eq!(
            session.authorization_url,
            "https://checkout.paystack.com/0peioxfhpn"
        );
        assert_eq!(session.access_code.as_deref(), Some("0peioxfhpn"));
    }

    #[test]
    fn initialize_refusals_carry_the_message() {
        let raw = json!({"status": false, "message": "Invalid key"});
        assert_eq!(
            interpret_initialize(&raw).unwrap_err(),
            GatewayError::Rejected("Invalid key".to_string())
        );
        let raw = json!({"status": true, "message": "ok", "data": {}});
        assert!(matches!(
            interpret_initialize(&raw),
            Err(GatewayError::Rejected(_))
        ));
    }

    #[test]
    fn config_defaults_to_the_public_api() {
        let config: PaystackConfig =
            serde_json::from_value(json!({"secret_key": "sk_test_x"})).unwrap();
        assert_eq!(config.base_url, "https://api.paystack.co");
        assert_eq!(config.timeout_secs, 15);
        let gateway = PaystackGateway::new(&config).unwrap();
        assert_eq!(
            gateway.base_url.join("transaction/initialize").unwrap().as_str(),
            "https://api.paystack.co/transaction/initialize"
        );
    }
}
