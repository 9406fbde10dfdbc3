//! Wallet funding through the payment gateway.
//!
//! Initiation only opens a checkout session; the balance moves when the
//! gateway's signed notification arrives. Reservation, credit and
//! finalization of a notification share one DB transaction, so a crash never
//! leaves a pending topup behind.

use serde_json::Value;
use sea_orm::{DatabaseTransaction, TransactionTrait};

use crate::{
    ChargeEvent, CheckoutRequest, EngineError, ResultEngine, TopupCredit, Transaction,
    TransactionStatus,
    signature::verify_signature,
    util::{TOPUP_PREFIX, new_reference},
};

use super::{Engine, Reservation, idempotency::try_reserve, retry_on_conflict, with_tx};

#[derive(Clone, Debug, PartialEq)]
pub struct TopupInit {
    pub reference: String,
    pub authorization_url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TopupOutcome {
    Credited(Transaction),
    AlreadyProcessed(Transaction),
    /// Authentic notification the ledger has nothing to do with.
    Ignored(String),
}

impl Engine {
    /// Open a checkout session for funding `account_id` with `amount_minor`.
    pub async fn initiate_topup(&self, account_id: &str, amount_minor: i64) -> ResultEngine<TopupInit> {
        if amount_minor < self.config.min_topup_minor {
            return Err(EngineError::InvalidAmount(format!(
                "minimum topup is {} minor units",
                self.config.min_topup_minor
            )));
        }
        let account = self.account(account_id).await?;
        let reference = new_reference(TOPUP_PREFIX);
        let checkout = CheckoutRequest {
            account_id: account.id,
            email: account.email,
            amount_minor,
            reference: reference.clone(),
        };
        let session = self.gateway.initialize(&checkout).await.map_err(|err| {
            tracing::warn!(%reference, error = %err, "checkout initialization failed");
            EngineError::Provider(err.to_string())
        })?;
        tracing::info!(account_id, %reference, amount_minor, "topup initiated");
        Ok(TopupInit {
            reference,
            authorization_url: session.authorization_url,
        })
    }

    /// Authenticate and apply a gateway notification.
    ///
    /// Fails with [`EngineError::Unauthorized`] when the signature does not
    /// match `raw_body`; nothing is parsed before that.
    pub async fn handle_gateway_notification(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> ResultEngine<TopupOutcome> {
        if !verify_signature(raw_body, signature, &self.webhook_secret) {
            tracing::warn!("gateway notification with invalid signature");
            return Err(EngineError::Unauthorized("invalid signature".to_string()));
        }
        let raw: Value = match serde_json::from_slice(raw_body) {
            Ok(raw) => raw,
            Err(err) => return Ok(ignored(format!("malformed notification: {err}"))),
        };
        let event: ChargeEvent = match serde_json::from_value(raw.clone()) {
            Ok(event) => event,
            Err(err) => return Ok(ignored(format!("unexpected notification shape: {err}"))),
        };
        if !event.is_successful_charge() {
            return Ok(ignored(format!(
                "event {} with status {}",
                event.event,
                event.data.status.as_deref().unwrap_or("none")
            )));
        }

        let data = &event.data;
        if data.reference.trim().is_empty() {
            return Ok(ignored("charge without reference".to_string()));
        }
        if data.amount <= 0 {
            return Ok(ignored(format!("non-positive amount {}", data.amount)));
        }
        let account = match (data.account_id(), data.email()) {
            (Some(account_id), _) => self.account(account_id).await,
            (None, Some(email)) => self.account_by_email(email).await,
            (None, None) => return Ok(ignored("charge without customer".to_string())),
        };
        let account = match account {
            Ok(account) => account,
            Err(EngineError::NotFound(who)) => {
                return Ok(ignored(format!("no account for {who}")));
            }
            Err(err) => return Err(err),
        };

        let mut credit = TopupCredit::new(account.id, data.amount, data.reference.clone()).raw(raw);
        if let Some(charge_id) = data.charge_id() {
            credit = credit.charge_id(charge_id);
        }
        self.credit_topup(credit).await
    }

    /// Credit a confirmed charge exactly once per reference.
    pub async fn credit_topup(&self, credit: TopupCredit) -> ResultEngine<TopupOutcome> {
        let TopupCredit {
            account_id,
            amount_minor,
            reference,
            charge_id,
            raw,
        } = credit;
        let pending = Transaction::pending_topup(account_id, amount_minor, reference, charge_id)?;
        let outcome = retry_on_conflict!(
            self,
            "topup credit",
            with_tx!(self, |db_tx| self.credit_in(&db_tx, &pending, raw.clone()).await)
        )?;
        match &outcome {
            TopupOutcome::Credited(tx) => tracing::info!(
                account_id = %tx.account_id,
                reference = %tx.reference,
                amount_minor = tx.amount_minor,
                "topup credited"
            ),
            TopupOutcome::AlreadyProcessed(tx) => tracing::info!(
                reference = %tx.reference,
                status = tx.status.as_str(),
                "duplicate topup notification"
            ),
            TopupOutcome::Ignored(_) => {}
        }
        Ok(outcome)
    }

    async fn credit_in(
        &self,
        db_tx: &DatabaseTransaction,
        pending: &Transaction,
        raw: Option<Value>,
    ) -> ResultEngine<TopupOutcome> {
        match try_reserve(db_tx, pending).await? {
            Reservation::AlreadyProcessed(existing) => {
                if existing.account_id != pending.account_id
                    || existing.amount_minor != pending.amount_minor
                {
                    tracing::warn!(
                        reference = %existing.reference,
                        "notification does not match the recorded transaction"
                    );
                }
                Ok(TopupOutcome::AlreadyProcessed(existing))
            }
            Reservation::Granted(tx) => {
                let credited = self
                    .settle(
                        db_tx,
                        &tx,
                        tx.amount_minor,
                        0,
                        TransactionStatus::Success,
                        None,
                        raw,
                    )
                    .await?;
                Ok(TopupOutcome::Credited(credited))
            }
        }
    }
}

fn ignored(reason: String) -> TopupOutcome {
    tracing::info!(%reason, "gateway notification ignored");
    TopupOutcome::Ignored(reason)
}
