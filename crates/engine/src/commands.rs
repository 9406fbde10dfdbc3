//! Command structs for engine operations.
//!
//! These types group parameters for write operations (purchase, topup
//! credit, manual resolution), keeping call sites readable and avoiding long
//! argument lists.

use serde_json::Value;

/// Buy electricity units for a meter, debiting the account.
#[derive(Clone, Debug)]
pub struct PurchaseCmd {
    pub account_id: String,
    pub provider_id: String,
    pub meter_id: String,
    pub amount_minor: i64,
    pub idempotency_key: Option<String>,
    pub phone: Option<String>,
}

impl PurchaseCmd {
    #[must_use]
    pub fn new(
        account_id: impl Into<String>,
        provider_id: impl Into<String>,
        meter_id: impl Into<String>,
        amount_minor: i64,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            provider_id: provider_id.into(),
            meter_id: meter_id.into(),
            amount_minor,
            idempotency_key: None,
            phone: None,
        }
    }

    #[must_use]
    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// A confirmed gateway charge to credit to an account.
#[derive(Clone, Debug)]
pub struct TopupCredit {
    pub account_id: String,
    pub amount_minor: i64,
    pub reference: String,
    pub charge_id: Option<String>,
    pub raw: Option<Value>,
}

impl TopupCredit {
    #[must_use]
    pub fn new(account_id: impl Into<String>, amount_minor: i64, reference: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            amount_minor,
            reference: reference.into(),
            charge_id: None,
            raw: None,
        }
    }

    #[must_use]
    pub fn charge_id(mut self, charge_id: impl Into<String>) -> Self {
        self.charge_id = Some(charge_id.into());
        self
    }

    #[must_use]
    pub fn raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// How a purchase ended, as learned from the biller or an operator.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Succeeded {
        token: Option<String>,
        raw: Option<Value>,
    },
    Failed {
        reason: String,
        raw: Option<Value>,
    },
    /// Outcome still unknown; the purchase stays pending.
    Unconfirmed {
        reason: String,
        raw: Option<Value>,
    },
}

impl Resolution {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unconfirmed { .. })
    }
}
