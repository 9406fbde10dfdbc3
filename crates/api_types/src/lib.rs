use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub id: String,
        pub email: String,
        pub balance_minor: i64,
        /// Funds reserved by purchases awaiting the biller.
        pub held_minor: i64,
        pub available_minor: i64,
    }
}

pub mod payment {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MeterVerify {
        /// Disco service code, e.g. `ikeja-electric`.
        pub provider_id: String,
        pub meter_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MeterView {
        pub customer_name: String,
        pub meter_type: Option<String>,
        pub outstanding_debt: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseNew {
        pub provider_id: String,
        pub meter_id: String,
        /// Must be > 0 and a whole number of naira (multiple of 100).
        pub amount_minor: i64,
        pub phone: Option<String>,
        /// Optional idempotency key for safely retrying the same purchase.
        pub idempotency_key: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct PurchaseResult {
        pub status: super::transaction::TransactionStatus,
        pub message: String,
        pub reference: String,
        pub provider_token: Option<String>,
        /// True when the request matched an earlier submission.
        pub replayed: bool,
    }
}

pub mod topup {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopupNew {
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TopupCheckout {
        pub reference: String,
        pub authorization_url: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionKind {
        Topup,
        Purchase,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TransactionStatus {
        Pending,
        Success,
        Failed,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct TransactionList {
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub id: Uuid,
        pub kind: TransactionKind,
        pub status: TransactionStatus,
        pub amount_minor: i64,
        pub reference: String,
        pub provider_id: Option<String>,
        pub meter_id: Option<String>,
        pub token: Option<String>,
        pub created_at: DateTime<Utc>,
        pub finalized_at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionListResponse {
        pub transactions: Vec<TransactionView>,
    }
}
