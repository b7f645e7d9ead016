//! Result and error types for the core library
//!
//! One variant per observable failure mode of a ledger operation. Callers
//! branch on the variant; the HTTP layer maps each to a status code.

use rust_decimal::Decimal;
use thiserror::Error;

use super::ids::{UserId, WalletId};

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive, over the configured ceiling, or arithmetic overflow
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Wallet not found: {0}")]
    WalletNotFound(String),

    #[error("User {user} does not own wallet {wallet}")]
    UserMismatch { user: UserId, wallet: WalletId },

    #[error("Transfer sender and receiver are the same wallet: {0}")]
    SelfTransfer(WalletId),

    #[error("Insufficient funds in wallet {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: WalletId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Another writer committed between our read and write; retried internally
    #[error("Version conflict on wallet {0}")]
    ConcurrencyConflict(WalletId),

    /// The bounded retry loop ran out of attempts; safe for the caller to retry
    #[error("Operation abandoned after {attempts} conflicting attempts")]
    ConcurrencyExhausted { attempts: u32 },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Create an invalid-amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a wallet-not-found error
    pub fn wallet_not_found(msg: impl Into<String>) -> Self {
        Self::WalletNotFound(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// True for transient failures the engine retries on its own
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
