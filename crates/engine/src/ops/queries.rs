//! Read-only transaction queries.

use sea_orm::{QueryFilter, QueryOrder, QuerySelect, prelude::*};

use crate::{EngineError, ResultEngine, Transaction, transactions};

use super::{Engine, ledger::find_by_reference};

/// Largest page `transactions` hands out.
const MAX_PAGE: u64 = 200;

impl Engine {
    /// Most recent transactions of an account, newest first.
    pub async fn transactions(&self, account_id: &str, limit: u64) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id))
            .order_by_desc(transactions::Column::CreatedAt)
            .order_by_desc(transactions::Column::Id)
            .limit(limit.clamp(1, MAX_PAGE))
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    pub async fn transaction_by_reference(&self, reference: &str) -> ResultEngine<Transaction> {
        find_by_reference(&self.database, reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(reference.to_string()))
    }
}
