//! The electricity biller seam.
//!
//! The engine never talks HTTP itself: it drives a [`Biller`] and decides
//! what to do with the balance from the error variant it gets back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Customer details returned by a successful meter verification.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeterInfo {
    pub customer_name: String,
    pub meter_type: Option<String>,
    /// Outstanding debt as reported by the biller, untouched.
    pub outstanding_debt: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BillerPurchase {
    pub provider_id: String,
    pub meter_id: String,
    pub amount_minor: i64,
    /// Our external reference, sent as the biller's request id.
    pub reference: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseReceipt {
    pub token: Option<String>,
    pub raw: Value,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BillerError {
    /// The biller answered and refused. Nothing was delivered.
    #[error("biller declined with code {code}: {message}")]
    Declined {
        code: String,
        message: String,
        raw: Value,
    },
    /// The request may or may not have been fulfilled: timeout, transport
    /// failure or an explicit "still processing" answer.
    #[error("biller outcome unknown: {reason}")]
    Unconfirmed { reason: String, raw: Option<Value> },
    /// The request never left this process.
    #[error("biller request not sent: {0}")]
    NotSent(String),
}

impl BillerError {
    /// Whether the biller definitely did not deliver.
    pub fn is_definitive(&self) -> bool {
        !matches!(self, Self::Unconfirmed { .. })
    }

    pub fn raw(&self) -> Option<&Value> {
        match self {
            Self::Declined { raw, .. } => Some(raw),
            Self::Unconfirmed { raw, .. } => raw.as_ref(),
            Self::NotSent(_) => None,
        }
    }
}

#[async_trait]
pub trait Biller: Send + Sync {
    async fn verify_meter(&self, provider_id: &str, meter_id: &str)
    -> Result<MeterInfo, BillerError>;

    async fn purchase(&self, request: &BillerPurchase) -> Result<PurchaseReceipt, BillerError>;
}

/// Stand-in used when no biller was configured; it never sends anything.
#[derive(Debug, Default)]
pub(crate) struct UnconfiguredBiller;

#[async_trait]
impl Biller for UnconfiguredBiller {
    async fn verify_meter(&self, _: &str, _: &str) -> Result<MeterInfo, BillerError> {
        Err(BillerError::NotSent("biller not configured".to_string()))
    }

    async fn purchase(&self, _: &BillerPurchase) -> Result<PurchaseReceipt, BillerError> {
        Err(BillerError::NotSent("biller not configured".to_string()))
    }
}
