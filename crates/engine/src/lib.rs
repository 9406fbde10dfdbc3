//! Balance and transaction reconciliation for prepaid electricity.
//!
//! Accounts are funded through a payment gateway and spent on electricity
//! units sold by a biller. The [`Engine`] keeps every balance change and its
//! audit record in step: external references are reserved exactly once,
//! balances are written with an optimistic version check and funds are held
//! while a purchase is in flight.

pub use accounts::Account;
pub use biller::{Biller, BillerError, BillerPurchase, MeterInfo, PurchaseReceipt};
pub use commands::{PurchaseCmd, Resolution, TopupCredit};
pub use error::EngineError;
pub use gateway::{
    ChargeCustomer, ChargeData, ChargeEvent, CheckoutRequest, CheckoutSession, Gateway,
    GatewayError,
};
pub use ops::{
    Engine, EngineBuilder, LedgerConfig, PurchaseOutcome, Reservation, TopupInit, TopupOutcome,
};
pub use signature::{sign, verify_signature};
pub use transactions::{Transaction, TransactionKind, TransactionStatus};

mod accounts;
mod biller;
mod commands;
mod error;
mod gateway;
mod ops;
mod signature;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
