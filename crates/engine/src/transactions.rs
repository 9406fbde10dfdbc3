//! Transaction primitives.
//!
//! A `Transaction` is the audit record of one balance-affecting operation.
//! It is created `pending` and moves exactly once to `success` or `failed`;
//! terminal rows are never written again.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{normalize_required, parse_uuid},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Topup,
    Purchase,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Topup => "topup",
            Self::Purchase => "purchase",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "topup" => Ok(Self::Topup),
            "purchase" => Ok(Self::Purchase),
            other => Err(EngineError::InvalidState(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(EngineError::InvalidState(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: String,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub status: TransactionStatus,
    /// Unique external reference, the idempotency key towards providers.
    pub reference: String,
    /// Client supplied key, unique per account.
    pub idempotency_key: Option<String>,
    /// Disco / service code for purchases.
    pub provider_id: Option<String>,
    pub meter_id: Option<String>,
    /// Gateway charge id for topups.
    pub charge_id: Option<String>,
    pub token: Option<String>,
    pub raw_response: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Transaction {
    fn pending(
        account_id: String,
        kind: TransactionKind,
        amount_minor: i64,
        reference: String,
    ) -> ResultEngine<Self> {
        if amount_minor <= 0 {
            return Err(EngineError::InvalidAmount(
                "amount_minor must be > 0".to_string(),
            ));
        }
        // Doubles as the idempotency key, so it must not be blank.
        let reference = normalize_required(&reference, "reference")?;
        Ok(Self {
            id: Uuid::new_v4(),
            account_id,
            kind,
            amount_minor,
            status: TransactionStatus::Pending,
            reference,
            idempotency_key: None,
            provider_id: None,
            meter_id: None,
            charge_id: None,
            token: None,
            raw_response: None,
            created_at: Utc::now(),
            finalized_at: None,
        })
    }

    pub fn pending_purchase(
        account_id: String,
        amount_minor: i64,
        reference: String,
        provider_id: String,
        meter_id: String,
        idempotency_key: Option<String>,
    ) -> ResultEngine<Self> {
        let mut tx = Self::pending(account_id, TransactionKind::Purchase, amount_minor, reference)?;
        tx.provider_id = Some(provider_id);
        tx.meter_id = Some(meter_id);
        tx.idempotency_key = idempotency_key;
        Ok(tx)
    }

    pub fn pending_topup(
        account_id: String,
        amount_minor: i64,
        reference: String,
        charge_id: Option<String>,
    ) -> ResultEngine<Self> {
        let mut tx = Self::pending(account_id, TransactionKind::Topup, amount_minor, reference)?;
        tx.charge_id = charge_id;
        Ok(tx)
    }

    /// Signed effect on the balance once the transaction succeeds.
    pub fn signed_amount_minor(&self) -> i64 {
        match self.kind {
            TransactionKind::Topup => self.amount_minor,
            TransactionKind::Purchase => -self.amount_minor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub status: String,
    #[sea_orm(unique)]
    pub reference: String,
    pub idempotency_key: Option<String>,
    pub provider_id: Option<String>,
    pub meter_id: Option<String>,
    pub charge_id: Option<String>,
    pub token: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub raw_response: Option<String>,
    pub created_at: DateTimeUtc,
    pub finalized_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            account_id: ActiveValue::Set(tx.account_id.clone()),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            reference: ActiveValue::Set(tx.reference.clone()),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
            provider_id: ActiveValue::Set(tx.provider_id.clone()),
            meter_id: ActiveValue::Set(tx.meter_id.clone()),
            charge_id: ActiveValue::Set(tx.charge_id.clone()),
            token: ActiveValue::Set(tx.token.clone()),
            raw_response: ActiveValue::Set(tx.raw_response.as_ref().map(Value::to_string)),
            created_at: ActiveValue::Set(tx.created_at),
            finalized_at: ActiveValue::Set(tx.finalized_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            account_id: model.account_id,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            amount_minor: model.amount_minor,
            status: TransactionStatus::try_from(model.status.as_str())?,
            reference: model.reference,
            idempotency_key: model.idempotency_key,
            provider_id: model.provider_id,
            meter_id: model.meter_id,
            charge_id: model.charge_id,
            token: model.token,
            // Providers occasionally answer with non-JSON bodies; keep them verbatim.
            raw_response: model
                .raw_response
                .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw))),
            created_at: model.created_at,
            finalized_at: model.finalized_at,
        })
    }
}
