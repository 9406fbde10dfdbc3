use std::{fmt, sync::Arc};

use sea_orm::DatabaseConnection;

use crate::{
    ResultEngine,
    biller::{Biller, UnconfiguredBiller},
    gateway::{Gateway, UnconfiguredGateway},
};

mod idempotency;
mod ledger;
mod purchase;
mod queries;
mod topup;

pub use idempotency::Reservation;
pub use purchase::PurchaseOutcome;
pub use topup::{TopupInit, TopupOutcome};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

/// Re-run `$body` while it fails with `EngineError::Conflict`, up to the
/// configured number of retries.
macro_rules! retry_on_conflict {
    ($self:expr, $label:literal, $body:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            match $body {
                Err($crate::EngineError::Conflict(reason))
                    if attempt < $self.config.conflict_retries =>
                {
                    attempt += 1;
                    tracing::debug!(attempt, %reason, "{} lost a race, retrying", $label);
                }
                other => break other,
            }
        }
    }};
}

pub(crate) use {retry_on_conflict, with_tx};

/// Tunables of the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Retries after an optimistic write lost a race.
    pub conflict_retries: u32,
    /// Smallest topup accepted at checkout.
    pub min_topup_minor: i64,
    /// Purchases must be a multiple of this; the biller bills whole units.
    pub purchase_unit_minor: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            conflict_retries: 5,
            min_topup_minor: 10_000,
            purchase_unit_minor: 100,
        }
    }
}

pub struct Engine {
    database: DatabaseConnection,
    biller: Arc<dyn Biller>,
    gateway: Arc<dyn Gateway>,
    webhook_secret: String,
    config: LedgerConfig,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("database", &self.database)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    biller: Option<Arc<dyn Biller>>,
    gateway: Option<Arc<dyn Gateway>>,
    webhook_secret: String,
    config: LedgerConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    pub fn biller(mut self, biller: Arc<dyn Biller>) -> EngineBuilder {
        self.biller = Some(biller);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> EngineBuilder {
        self.gateway = Some(gateway);
        self
    }

    /// Secret shared with the gateway, used to authenticate its webhooks.
    pub fn webhook_secret(mut self, secret: impl Into<String>) -> EngineBuilder {
        self.webhook_secret = secret.into();
        self
    }

    pub fn config(mut self, config: LedgerConfig) -> EngineBuilder {
        self.config = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            biller: self.biller.unwrap_or_else(|| Arc::new(UnconfiguredBiller)),
            gateway: self.gateway.unwrap_or_else(|| Arc::new(UnconfiguredGateway)),
            webhook_secret: self.webhook_secret,
            config: self.config,
        })
    }
}
