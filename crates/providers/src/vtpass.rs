//! VTpass electricity biller.
//!
//! VTpass answers HTTP 200 for most outcomes and puts the verdict in `code`:
//! `000` is delivered, `099` is still processing, anything else is a refusal.

use async_trait::async_trait;
use engine::{Biller, BillerError, BillerPurchase, MeterInfo, PurchaseReceipt};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{ProviderError, base_url, http_client};

const DELIVERED: &str = "000";
const PROCESSING: &str = "099";

#[derive(Clone, Debug, Deserialize)]
pub struct VtpassConfig {
    pub base_url: String,
    pub api_key: String,
    pub secret_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone)]
pub struct VtpassBiller {
    base_url: Url,
    api_key: String,
    secret_key: String,
    http: reqwest::Client,
}

impl VtpassBiller {
    pub fn new(config: &VtpassConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            base_url: base_url(&config.base_url)?,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            http: http_client(config.timeout_secs)?,
        })
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, BillerError> {
        let endpoint = self
            .base_url
            .join(path)
            .map_err(|err| BillerError::NotSent(format!("invalid endpoint {path}: {err}")))?;
        let res = self
            .http
            .post(endpoint)
            .header("api-key", &self.api_key)
            .header("secret-key", &self.secret_key)
            .json(payload)
            .send()
            .await
            .map_err(|err| {
                if err.is_builder() {
                    BillerError::NotSent(err.to_string())
                } else {
                    BillerError::Unconfirmed {
                        reason: format!("transport: {err}"),
                        raw: None,
                    }
                }
            })?;
        let status = res.status();
        let text = res.text().await.map_err(|err| BillerError::Unconfirmed {
            reason: format!("reading response: {err}"),
            raw: None,
        })?;
        serde_json::from_str(&text).map_err(|_| BillerError::Unconfirmed {
            reason: format!("http {status} with a non-JSON body"),
            raw: Some(Value::String(text)),
        })
    }
}

#[async_trait]
impl Biller for VtpassBiller {
    async fn verify_meter(
        &self,
        provider_id: &str,
        meter_id: &str,
    ) -> Result<MeterInfo, BillerError> {
        let payload = json!({
            "serviceID": provider_id,
            "billersCode": meter_id,
            "type": "prepaid",
        });
        let raw = self.post("merchant-verify", &payload).await?;
        interpret_verify(raw)
    }

    async fn purchase(&self, request: &BillerPurchase) -> Result<PurchaseReceipt, BillerError> {
        // VTpass bills in naira.
        let payload = json!({
            "request_id": request.reference,
            "serviceID": request.provider_id,
            "billersCode": request.meter_id,
            "variation_code": "prepaid",
            "amount": request.amount_minor / 100,
            "phone": request.phone.as_deref().unwrap_or_default(),
        });
        let raw = self.post("pay", &payload).await?;
        let outcome = interpret_purchase(raw);
        match &outcome {
            Ok(_) => tracing::debug!(reference = %request.reference, "vtpass delivered"),
            Err(err) => tracing::debug!(reference = %request.reference, error = %err, "vtpass did not deliver"),
        }
        outcome
    }
}

fn code_of(raw: &Value) -> Option<&str> {
    raw.get("code").and_then(Value::as_str)
}

fn description_of(raw: &Value) -> String {
    raw.get("response_description")
        .and_then(Value::as_str)
        .unwrap_or("no description")
        .to_string()
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn interpret_verify(raw: Value) -> Result<MeterInfo, BillerError> {
    let content = raw.get("content");
    let customer = content.and_then(|c| text_field(c.get("Customer_Name")));
    // A 000 answer without a customer is how VTpass reports an unknown meter.
    match (code_of(&raw), customer) {
        (Some(DELIVERED), Some(customer_name)) => {
            let content = content.cloned().unwrap_or(Value::Null);
            Ok(MeterInfo {
                customer_name,
                meter_type: text_field(content.get("Meter_Type").or(content.get("MeterType"))),
                outstanding_debt: text_field(content.get("amount")),
            })
        }
        (code, _) => {
            let message = content
                .and_then(|c| c.get("error"))
                .and_then(Value::as_str)
                .map_or_else(|| description_of(&raw), ToString::to_string);
            Err(BillerError::Declined {
                code: code.unwrap_or("unknown").to_string(),
                message,
                raw,
            })
        }
    }
}

pub(crate) fn interpret_purchase(raw: Value) -> Result<PurchaseReceipt, BillerError> {
    match code_of(&raw) {
        Some(DELIVERED) => {
            let token = text_field(raw.get("token"))
                .or_else(|| text_field(raw.get("purchased_code")))
                .or_else(|| text_field(raw.get("content").and_then(|c| c.get("token"))));
            Ok(PurchaseReceipt { token, raw })
        }
        Some(PROCESSING) => Err(BillerError::Unconfirmed {
            reason: "biller is still processing".to_string(),
            raw: Some(raw),
        }),
        Some(code) => Err(BillerError::Declined {
            code: code.to_string(),
            message: description_of(&raw),
            raw,
        }),
        None => Err(BillerError::Unconfirmed {
            reason: "response without a code".to_string(),
            raw: Some(raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_reads_customer_and_debt() {
        let raw = json!({
            "code": "000",
            "content": {
                "Customer_Name": "ADA LOVELACE",
                "Meter_Type": "PREPAID",
                "amount": 1250.5
            }
        });
        let info = interpret_verify(raw).unwrap();
        assert_eq!(info.customer_name, "ADA LOVELACE");
        assert_eq!(info.meter_type.as_deref(), Some("PREPAID"));
        assert_eq!(info.outstanding_debt.as_deref(), Some("1250.5"));
    }

    #[test]
    fn verify_without_customer_is_a_refusal() {
        let raw = json!({
            "code": "000",
            "content": {"error": "This meter is not correct or is not a valid Ikeja prepaid meter."}
        });
        let err = interpret_verify(raw).unwrap_err();
        assert!(err.is_definitive());
        assert!(err.to_string().contains("not a valid"));
    }

    #[test]
    fn purchase_codes_map_to_outcomes() {
        let delivered = interpret_purchase(json!({
            "code": "000",
            "purchased_code": "Token : 4356-2313-0000",
            "token": "4356-2313-0000"
        }))
        .unwrap();
        assert_eq!(delivered.token.as_deref(), Some("4356-2313-0000"));

        let nested = interpret_purchase(json!({"code": "000", "content": {"token": "77"}})).unwrap();
        assert_eq!(nested.token.as_deref(), Some("77"));

        let processing = interpret_purchase(json!({"code": "099"})).unwrap_err();
        assert!(!processing.is_definitive());

        let declined = interpret_purchase(json!({
            "code": "016",
            "response_description": "TRANSACTION FAILED"
        }))
        .unwrap_err();
        assert!(declined.is_definitive());
        assert!(matches!(declined, BillerError::Declined { ref code, .. } if code == "016"));

        assert!(!interpret_purchase(json!({"status": "ok"})).unwrap_err().is_definitive());
    }

    #[test]
    fn code_comparison_is_exact() {
        let err = interpret_purchase(json!({"code": 0})).unwrap_err();
        assert!(!err.is_definitive());
        let err = interpret_purchase(json!({"code": "0"})).unwrap_err();
        assert!(err.is_definitive());
    }

    #[test]
    fn biller_endpoints_stay_under_the_api_prefix() {
        let config = VtpassConfig {
            base_url: "https://sandbox.vtpass.com/api".to_string(),
            api_key: "key".to_string(),
            secret_key: "secret".to_string(),
            timeout_secs: 5,
        };
        let biller = VtpassBiller::new(&config).unwrap();
        assert_eq!(
            biller.base_url.join("pay").unwrap().as_str(),
            "https://sandbox.vtpass.com/api/pay"
        );

        let broken = VtpassConfig {
            base_url: "sandbox.vtpass.com".to_string(),
            ..config
        };
        assert!(matches!(
            VtpassBiller::new(&broken),
            Err(ProviderError::InvalidBaseUrl { .. })
        ));
    }
}
