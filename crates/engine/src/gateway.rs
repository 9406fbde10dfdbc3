//! The payment gateway seam and its webhook payload.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutRequest {
    pub account_id: String,
    pub email: String,
    pub amount_minor: i64,
    pub reference: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckoutSession {
    pub authorization_url: String,
    pub access_code: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("gateway rejected the request: {0}")]
    Rejected(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn initialize(&self, checkout: &CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

#[derive(Debug, Default)]
pub(crate) struct UnconfiguredGateway;

#[async_trait]
impl Gateway for UnconfiguredGateway {
    async fn initialize(&self, _: &CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::Unavailable("gateway not configured".to_string()))
    }
}

/// Webhook notification as posted by the gateway.
#[derive(Clone, Debug, Deserialize)]
pub struct ChargeEvent {
    pub event: String,
    pub data: ChargeData,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChargeData {
    pub id: Option<Value>,
    pub status: Option<String>,
    pub reference: String,
    /// Minor units.
    pub amount: i64,
    pub email: Option<String>,
    pub customer: Option<ChargeCustomer>,
    /// Free form; an object when we attached it at checkout, often `""`.
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChargeCustomer {
    pub email: Option<String>,
}

impl ChargeEvent {
    pub const CHARGE_SUCCESS: &'static str = "charge.success";

    pub fn is_successful_charge(&self) -> bool {
        self.event == Self::CHARGE_SUCCESS && self.data.status.as_deref() == Some("success")
    }
}

impl ChargeData {
    pub fn account_id(&self) -> Option<&str> {
        self.metadata
            .get("account_id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn email(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.email.as_deref())
            .or(self.email.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    pub fn charge_id(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_charge_with_metadata() {
        let raw = r#"{
            "event": "charge.success",
            "data": {
                "id": 302961,
                "status": "success",
                "reference": "epay_1_abcdef01",
                "amount": 1000,
                "customer": {"email": "ada@example.com"},
                "metadata": {"account_id": "acc-1"}
            }
        }"#;
        let event: ChargeEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_successful_charge());
        assert_eq!(event.data.account_id(), Some("acc-1"));
        assert_eq!(event.data.email(), Some("ada@example.com"));
        assert_eq!(event.data.charge_id().as_deref(), Some("302961"));
    }

    #[test]
    fn empty_metadata_and_other_events() {
        let raw = r#"{
            "event": "transfer.success",
            "data": {"status": "success", "reference": "r", "amount": 5, "email": "x@y.z", "metadata": ""}
        }"#;
        let event: ChargeEvent = serde_json::from_str(raw).unwrap();
        assert!(!event.is_successful_charge());
        assert_eq!(event.data.account_id(), None);
        assert_eq!(event.data.email(), Some("x@y.z"));
        assert_eq!(event.data.charge_id(), None);
    }
}
