//! The module contains the errors the engine can throw.
//!
//! The ones callers usually branch on are:
//!
//! - [`InsufficientFunds`] thrown when the available balance cannot cover a
//!   purchase.
//! - [`NotFound`] thrown when an account or a transaction does not exist.
//! - [`Conflict`] thrown when an optimistic write lost a race. The engine
//!   retries it internally and only surfaces it once the retries run out.
//! - [`Unauthorized`] thrown when a gateway notification fails signature
//!   verification.
//!
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`NotFound`]: EngineError::NotFound
//!  [`Conflict`]: EngineError::Conflict
//!  [`Unauthorized`]: EngineError::Unauthorized
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Concurrent update: {0}")]
    Conflict(String),
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidState(a), Self::InvalidState(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::Provider(a), Self::Provider(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
