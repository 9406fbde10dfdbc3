//! Account primitives.
//!
//! An `Account` holds a balance in minor units. Part of that balance may be
//! on hold while a purchase waits for the biller: held funds still belong to
//! the account but cannot back another purchase.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub balance_minor: i64,
    pub held_minor: i64,
    /// Bumped by every balance write; stale writers are rejected.
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(email: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            balance_minor: 0,
            held_minor: 0,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Balance that can still back a new purchase.
    pub fn available_minor(&self) -> i64 {
        self.balance_minor - self.held_minor
    }

    /// Returns the account as it would look after moving `balance_delta`
    /// into the balance and `held_delta` into the hold.
    ///
    /// The balance never goes negative and the hold never exceeds it.
    pub(crate) fn adjusted(&self, balance_delta: i64, held_delta: i64) -> ResultEngine<Self> {
        let balance_minor = self
            .balance_minor
            .checked_add(balance_delta)
            .ok_or_else(|| EngineError::InvalidAmount("balance overflow".to_string()))?;
        let held_minor = self
            .held_minor
            .checked_add(held_delta)
            .ok_or_else(|| EngineError::InvalidAmount("hold overflow".to_string()))?;
        if balance_minor < 0 {
            return Err(EngineError::InsufficientFunds(format!(
                "account {} balance would become {balance_minor}",
                self.id
            )));
        }
        if held_minor < 0 {
            return Err(EngineError::InvalidState(format!(
                "account {} hold would become {held_minor}",
                self.id
            )));
        }
        if held_minor > balance_minor {
            return Err(EngineError::InsufficientFunds(format!(
                "available {} is lower than {held_delta}",
                self.available_minor()
            )));
        }
        Ok(Self {
            balance_minor,
            held_minor,
            ..self.clone()
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub email: String,
    pub balance_minor: i64,
    pub held_minor: i64,
    pub version: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.clone()),
            email: ActiveValue::Set(account.email.clone()),
            balance_minor: ActiveValue::Set(account.balance_minor),
            held_minor: ActiveValue::Set(account.held_minor),
            version: ActiveValue::Set(account.version),
            created_at: ActiveValue::Set(account.created_at),
        }
    }
}

impl From<Model> for Account {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            balance_minor: model.balance_minor,
            held_minor: model.held_minor,
            version: model.version,
            created_at: model.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(balance_minor: i64, held_minor: i64) -> Account {
        Account {
            balance_minor,
            held_minor,
            ..Account::new("ada@example.com".to_string())
        }
    }

    #[test]
    fn hold_cannot_exceed_balance() {
        let account = funded(1_000, 600);
        assert_eq!(account.available_minor(), 400);
        assert!(matches!(
            account.adjusted(0, 500),
            Err(EngineError::InsufficientFunds(_))
        ));
        let held = account.adjusted(0, 400).unwrap();
        assert_eq!(held.available_minor(), 0);
    }

    #[test]
    fn settling_a_hold_moves_both_columns() {
        let account = funded(1_000, 700);
        let settled = account.adjusted(-700, -700).unwrap();
        assert_eq!(settled.balance_minor, 300);
        assert_eq!(settled.held_minor, 0);
        assert_eq!(settled.version, account.version);
    }

    #[test]
    fn balance_never_goes_negative() {
        let account = funded(100, 0);
        assert!(matches!(
            account.adjusted(-101, 0),
            Err(EngineError::InsufficientFunds(_))
        ));
        assert!(matches!(
            account.adjusted(0, -1),
            Err(EngineError::InvalidState(_))
        ));
    }
}
