//! Idempotency guard.
//!
//! A reservation is the insert of the pending transaction row. The unique
//! indexes on `reference` and `(account_id, idempotency_key)` make the
//! storage layer the arbiter: of two concurrent reservations for the same
//! key exactly one row lands, the other caller observes it.

use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbErr, QueryFilter, SqlErr, TransactionTrait, prelude::*,
};

use crate::{EngineError, ResultEngine, Transaction, TransactionKind, transactions};

use super::{
    Engine, ledger::find_by_reference, purchase::hold_and_reserve, retry_on_conflict, with_tx,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Reservation {
    /// The row was inserted; the caller owns the side effects.
    Granted(Transaction),
    /// A row with the same key exists already, returned as stored.
    AlreadyProcessed(Transaction),
}

impl Engine {
    /// Reserve the pending transaction `tx` exactly once.
    ///
    /// A purchase also puts its amount on hold: every pending purchase
    /// carries a hold equal to its amount until it is settled.
    pub async fn reserve(&self, tx: &Transaction) -> ResultEngine<Reservation> {
        retry_on_conflict!(
            self,
            "reserve",
            with_tx!(self, |db_tx| match tx.kind {
                TransactionKind::Purchase => hold_and_reserve(&db_tx, tx).await,
                TransactionKind::Topup => try_reserve(&db_tx, tx).await,
            })
        )
    }
}

/// Look up the row that would collide with `tx`.
pub(super) async fn find_existing<C: ConnectionTrait>(
    db: &C,
    tx: &Transaction,
) -> ResultEngine<Option<Transaction>> {
    if let Some(existing) = find_by_reference(db, &tx.reference).await? {
        return Ok(Some(existing));
    }
    let Some(key) = tx.idempotency_key.as_deref() else {
        return Ok(None);
    };
    transactions::Entity::find()
        .filter(transactions::Column::AccountId.eq(tx.account_id.as_str()))
        .filter(transactions::Column::IdempotencyKey.eq(key))
        .one(db)
        .await?
        .map(Transaction::try_from)
        .transpose()
}

/// Insert `tx` unless a colliding row exists.
///
/// Losing an insert race surfaces as [`EngineError::Conflict`]: the caller's
/// DB transaction must be dropped and the whole step retried, at which point
/// `find_existing` sees the winner's row.
pub(super) async fn try_reserve(
    db_tx: &DatabaseTransaction,
    tx: &Transaction,
) -> ResultEngine<Reservation> {
    if let Some(existing) = find_existing(db_tx, tx).await? {
        return Ok(Reservation::AlreadyProcessed(existing));
    }
    match transactions::ActiveModel::from(tx).insert(db_tx).await {
        Ok(_) => Ok(Reservation::Granted(tx.clone())),
        Err(err) if is_unique_violation(&err) => Err(EngineError::Conflict(format!(
            "reference {} reserved concurrently",
            tx.reference
        ))),
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;

    #[tokio::test]
    async fn duplicate_reference_insert_is_a_unique_violation() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();
        let account = engine.open_account("ada@example.com").await.unwrap();

        let tx = Transaction::pending_topup(account.id.clone(), 100, "ref-dup".to_string(), None)
            .unwrap();
        let twin = Transaction::pending_topup(account.id.clone(), 700, "ref-dup".to_string(), None)
            .unwrap();
        transactions::ActiveModel::from(&tx).insert(&db).await.unwrap();
        let err = transactions::ActiveModel::from(&twin)
            .insert(&db)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        // Through the guard the same collision resolves to the stored row.
        let Reservation::AlreadyProcessed(existing) = engine.reserve(&twin).await.unwrap() else {
            panic!("expected the stored reservation");
        };
        assert_eq!(existing.id, tx.id);
        assert_eq!(existing.amount_minor, 100);
    }
}
