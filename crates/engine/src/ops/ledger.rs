//! Ledger store: account reads and version-checked balance writes.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DatabaseTransaction, QueryFilter, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde_json::Value;

use crate::{
    Account, EngineError, ResultEngine, Transaction, TransactionKind, TransactionStatus, accounts,
    transactions,
    util::normalize_email,
};

use super::{Engine, retry_on_conflict, with_tx};

impl Engine {
    /// Open an empty account for `email`.
    pub async fn open_account(&self, email: &str) -> ResultEngine<Account> {
        let email = normalize_email(email)?;
        let existing = accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email.as_str()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::ExistingKey(email));
        }
        let account = Account::new(email);
        accounts::ActiveModel::from(&account)
            .insert(&self.database)
            .await?;
        tracing::info!(account_id = %account.id, "account opened");
        Ok(account)
    }

    pub async fn account(&self, account_id: &str) -> ResultEngine<Account> {
        load_account(&self.database, account_id).await
    }

    pub async fn account_by_email(&self, email: &str) -> ResultEngine<Account> {
        let email = normalize_email(email)?;
        accounts::Entity::find()
            .filter(accounts::Column::Email.eq(email.as_str()))
            .one(&self.database)
            .await?
            .map(Account::from)
            .ok_or(EngineError::NotFound(email))
    }

    /// Apply `delta_minor` to the balance and mark the pending transaction
    /// `reference` as successful, atomically.
    ///
    /// `delta_minor` must be the signed amount of the transaction. A purchase
    /// debit also releases the hold its reservation placed. A delta that
    /// would drive the balance below zero fails with
    /// [`EngineError::InsufficientFunds`] and changes nothing.
    pub async fn apply_delta(
        &self,
        account_id: &str,
        delta_minor: i64,
        reference: &str,
    ) -> ResultEngine<Account> {
        retry_on_conflict!(
            self,
            "apply_delta",
            with_tx!(self, |db_tx| {
                self.apply_delta_in(&db_tx, account_id, delta_minor, reference)
                    .await
            })
        )
    }

    async fn apply_delta_in(
        &self,
        db_tx: &DatabaseTransaction,
        account_id: &str,
        delta_minor: i64,
        reference: &str,
    ) -> ResultEngine<Account> {
        let tx = find_by_reference(db_tx, reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(reference.to_string()))?;
        if tx.account_id != account_id {
            return Err(EngineError::InvalidState(format!(
                "transaction {reference} does not belong to account {account_id}"
            )));
        }
        if delta_minor != tx.signed_amount_minor() {
            return Err(EngineError::InvalidAmount(format!(
                "delta {delta_minor} does not match transaction {reference}"
            )));
        }
        let current = load_account(db_tx, account_id).await?;
        // A pending purchase was reserved together with its hold; the debit
        // consumes that hold.
        let held_delta = match tx.kind {
            TransactionKind::Purchase => -tx.amount_minor,
            TransactionKind::Topup => 0,
        };
        let next = current.adjusted(delta_minor, held_delta)?;
        write_account(db_tx, &current, &next).await?;
        finalize(db_tx, &tx, TransactionStatus::Success, None, None).await?;
        Ok(Account {
            version: current.version + 1,
            ..next
        })
    }

    /// Move the hold and balance of `tx`'s account and close `tx` with
    /// `status`, inside the caller's DB transaction.
    pub(super) async fn settle(
        &self,
        db_tx: &DatabaseTransaction,
        tx: &Transaction,
        balance_delta: i64,
        held_delta: i64,
        status: TransactionStatus,
        token: Option<String>,
        raw: Option<Value>,
    ) -> ResultEngine<Transaction> {
        let current = load_account(db_tx, &tx.account_id).await?;
        let next = current.adjusted(balance_delta, held_delta)?;
        write_account(db_tx, &current, &next).await?;
        finalize(db_tx, tx, status, token, raw).await
    }
}

pub(super) async fn load_account<C: ConnectionTrait>(
    db: &C,
    account_id: &str,
) -> ResultEngine<Account> {
    accounts::Entity::find_by_id(account_id.to_string())
        .one(db)
        .await?
        .map(Account::from)
        .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))
}

/// Persist `next` only if the row still carries `current.version`.
pub(super) async fn write_account(
    db_tx: &DatabaseTransaction,
    current: &Account,
    next: &Account,
) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::BalanceMinor, Expr::value(next.balance_minor))
        .col_expr(accounts::Column::HeldMinor, Expr::value(next.held_minor))
        .col_expr(accounts::Column::Version, Expr::value(current.version + 1))
        .filter(accounts::Column::Id.eq(current.id.as_str()))
        .filter(accounts::Column::Version.eq(current.version))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::Conflict(format!(
            "account {} changed since version {}",
            current.id, current.version
        )));
    }
    Ok(())
}

/// Move a pending transaction to its terminal status.
///
/// The update is guarded on `status = pending`, so a second finalizer loses.
pub(super) async fn finalize(
    db_tx: &DatabaseTransaction,
    tx: &Transaction,
    status: TransactionStatus,
    token: Option<String>,
    raw: Option<Value>,
) -> ResultEngine<Transaction> {
    if !status.is_terminal() {
        return Err(EngineError::InvalidState(
            "a transaction can only be finalized to a terminal status".to_string(),
        ));
    }
    let finalized_at = Utc::now();
    let raw_text = raw.as_ref().map(Value::to_string);
    let result = transactions::Entity::update_many()
        .col_expr(transactions::Column::Status, Expr::value(status.as_str()))
        .col_expr(transactions::Column::Token, Expr::value(token.clone()))
        .col_expr(transactions::Column::RawResponse, Expr::value(raw_text))
        .col_expr(transactions::Column::FinalizedAt, Expr::value(finalized_at))
        .filter(transactions::Column::Id.eq(tx.id.to_string()))
        .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::InvalidState(format!(
            "transaction {} is already finalized",
            tx.reference
        )));
    }
    Ok(Transaction {
        status,
        token,
        raw_response: raw,
        finalized_at: Some(finalized_at),
        ..tx.clone()
    })
}

pub(super) async fn find_by_reference<C: ConnectionTrait>(
    db: &C,
    reference: &str,
) -> ResultEngine<Option<Transaction>> {
    transactions::Entity::find()
        .filter(transactions::Column::Reference.eq(reference))
        .one(db)
        .await?
        .map(Transaction::try_from)
        .transpose()
}
