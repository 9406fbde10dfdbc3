//! Electricity purchase coordination.
//!
//! A purchase runs in three steps:
//!
//! 1. In one DB transaction: check the free balance, put the amount on hold
//!    and reserve the pending row.
//! 2. Call the biller outside any DB transaction.
//! 3. Settle: on success the held amount leaves the balance, on a definite
//!    decline the hold is released, on an unknown outcome nothing moves and
//!    the row stays pending until it is resolved out of band.

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    BillerError, BillerPurchase, EngineError, MeterInfo, PurchaseCmd, PurchaseReceipt, Resolution, ResultEngine,
    Transaction, TransactionKind, TransactionStatus, transactions,
    util::{PURCHASE_PREFIX, new_reference, normalize_optional_text, normalize_required},
};

use super::{
    Engine, Reservation,
    idempotency::{find_existing, try_reserve},
    ledger::{find_by_reference, load_account, write_account},
    retry_on_conflict, with_tx,
};

/// Result of a purchase submission.
#[derive(Clone, Debug, PartialEq)]
pub struct PurchaseOutcome {
    pub transaction: Transaction,
    /// True when the submission matched an earlier one and nothing new ran.
    pub replayed: bool,
}

impl PurchaseOutcome {
    pub fn status(&self) -> TransactionStatus {
        self.transaction.status
    }

    pub fn message(&self) -> &'static str {
        match self.transaction.status {
            TransactionStatus::Success => "purchase successful",
            TransactionStatus::Pending => "purchase submitted, awaiting confirmation from the biller",
            TransactionStatus::Failed => "purchase declined by the biller",
        }
    }
}

impl From<Result<PurchaseReceipt, BillerError>> for Resolution {
    fn from(result: Result<PurchaseReceipt, BillerError>) -> Self {
        match result {
            Ok(receipt) => Resolution::Succeeded {
                token: receipt.token,
                raw: Some(receipt.raw),
            },
            Err(err) if err.is_definitive() => Resolution::Failed {
                reason: err.to_string(),
                raw: err.raw().cloned(),
            },
            Err(err) => Resolution::Unconfirmed {
                reason: err.to_string(),
                raw: err.raw().cloned(),
            },
        }
    }
}

impl Engine {
    /// Ask the biller who owns `meter_id`. Read only.
    pub async fn verify_meter(&self, provider_id: &str, meter_id: &str) -> ResultEngine<MeterInfo> {
        let provider_id = normalize_required(provider_id, "provider_id")?;
        let meter_id = normalize_required(meter_id, "meter_id")?;
        self.biller
            .verify_meter(&provider_id, &meter_id)
            .await
            .map_err(|err| {
                tracing::warn!(%provider_id, %meter_id, error = %err, "meter verification failed");
                EngineError::Provider(err.to_string())
            })
    }

    /// Debit the account and buy electricity units.
    ///
    /// Declines come back as `Ok` with a failed transaction; only problems
    /// before the biller is called are errors.
    pub async fn purchase(&self, cmd: PurchaseCmd) -> ResultEngine<PurchaseOutcome> {
        let PurchaseCmd {
            account_id,
            provider_id,
            meter_id,
            amount_minor,
            idempotency_key,
            phone,
        } = cmd;
        let unit = self.config.purchase_unit_minor;
        if amount_minor <= 0 || (unit > 0 && amount_minor % unit != 0) {
            return Err(EngineError::InvalidAmount(format!(
                "amount_minor must be a positive multiple of {unit}"
            )));
        }
        let pending = Transaction::pending_purchase(
            account_id,
            amount_minor,
            new_reference(PURCHASE_PREFIX),
            normalize_required(&provider_id, "provider_id")?,
            normalize_required(&meter_id, "meter_id")?,
            normalize_optional_text(idempotency_key.as_deref()),
        )?;

        let reservation = retry_on_conflict!(
            self,
            "purchase hold",
            with_tx!(self, |db_tx| hold_and_reserve(&db_tx, &pending).await)
        )?;
        let tx = match reservation {
            Reservation::Granted(tx) => tx,
            Reservation::AlreadyProcessed(existing) => {
                tracing::info!(
                    reference = %existing.reference,
                    status = existing.status.as_str(),
                    "purchase replayed"
                );
                return Ok(PurchaseOutcome {
                    transaction: existing,
                    replayed: true,
                });
            }
        };
        tracing::info!(
            account_id = %tx.account_id,
            reference = %tx.reference,
            amount_minor = tx.amount_minor,
            "funds held, calling biller"
        );

        let request = BillerPurchase {
            provider_id: tx.provider_id.clone().unwrap_or_default(),
            meter_id: tx.meter_id.clone().unwrap_or_default(),
            amount_minor: tx.amount_minor,
            reference: tx.reference.clone(),
            phone,
        };
        let resolution = Resolution::from(self.biller.purchase(&request).await);
        let transaction = self.apply_resolution(&tx, resolution).await?;
        Ok(PurchaseOutcome {
            transaction,
            replayed: false,
        })
    }

    /// Purchases still waiting for an outcome, created before `older_than`.
    pub async fn pending_purchases(
        &self,
        older_than: DateTime<Utc>,
    ) -> ResultEngine<Vec<Transaction>> {
        transactions::Entity::find()
            .filter(transactions::Column::Kind.eq(TransactionKind::Purchase.as_str()))
            .filter(transactions::Column::Status.eq(TransactionStatus::Pending.as_str()))
            .filter(transactions::Column::CreatedAt.lt(older_than))
            .order_by_asc(transactions::Column::CreatedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    /// Close a pending purchase with an outcome learned out of band.
    pub async fn resolve_pending_purchase(
        &self,
        reference: &str,
        resolution: Resolution,
    ) -> ResultEngine<Transaction> {
        if !resolution.is_terminal() {
            return Err(EngineError::InvalidState(
                "a resolution must be terminal".to_string(),
            ));
        }
        let tx = find_by_reference(&self.database, reference)
            .await?
            .ok_or_else(|| EngineError::NotFound(reference.to_string()))?;
        if tx.kind != TransactionKind::Purchase || tx.status.is_terminal() {
            return Err(EngineError::InvalidState(format!(
                "{reference} is not a pending purchase"
            )));
        }
        tracing::info!(%reference, "resolving pending purchase");
        self.apply_resolution(&tx, resolution).await
    }

    async fn apply_resolution(
        &self,
        tx: &Transaction,
        resolution: Resolution,
    ) -> ResultEngine<Transaction> {
        let amount = tx.amount_minor;
        match resolution {
            Resolution::Succeeded { token, raw } => {
                let settled = retry_on_conflict!(
                    self,
                    "purchase settle",
                    with_tx!(self, |db_tx| {
                        self.settle(
                            &db_tx,
                            tx,
                            -amount,
                            -amount,
                            TransactionStatus::Success,
                            token.clone(),
                            raw.clone(),
                        )
                        .await
                    })
                )?;
                tracing::info!(reference = %tx.reference, "purchase succeeded");
                Ok(settled)
            }
            Resolution::Failed { reason, raw } => {
                let settled = retry_on_conflict!(
                    self,
                    "purchase release",
                    with_tx!(self, |db_tx| {
                        self.settle(
                            &db_tx,
                            tx,
                            0,
                            -amount,
                            TransactionStatus::Failed,
                            None,
                            raw.clone(),
                        )
                        .await
                    })
                )?;
                tracing::warn!(reference = %tx.reference, %reason, "purchase failed, hold released");
                Ok(settled)
            }
            Resolution::Unconfirmed { reason, .. } => {
                tracing::warn!(
                    reference = %tx.reference,
                    %reason,
                    "purchase outcome unknown, left pending with funds on hold"
                );
                Ok(tx.clone())
            }
        }
    }
}

pub(super) async fn hold_and_reserve(
    db_tx: &DatabaseTransaction,
    pending: &Transaction,
) -> ResultEngine<Reservation> {
    // Replays answer with the recorded outcome even if funds ran out since.
    if let Some(existing) = find_existing(db_tx, pending).await? {
        return Ok(Reservation::AlreadyProcessed(existing));
    }
    let current = load_account(db_tx, &pending.account_id).await?;
    if current.available_minor() < pending.amount_minor {
        return Err(EngineError::InsufficientFunds(format!(
            "available {} is lower than {}",
            current.available_minor(),
            pending.amount_minor
        )));
    }
    let next = current.adjusted(0, pending.amount_minor)?;
    write_account(db_tx, &current, &next).await?;
    try_reserve(db_tx, pending).await
}
