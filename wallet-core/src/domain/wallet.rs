//! Wallet domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{UserId, WalletId};

/// A user's balance together with the version counter that guards writes.
///
/// Balances are mutated only through the ledger engine; every committed
/// mutation bumps `version` by exactly one, which is what lets an overlapped
/// read-then-write be detected instead of silently overwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: Decimal,
    /// Incremented by the store on every committed balance write
    pub version: i64,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    /// Soft-delete marker; a marked wallet is invisible to lookups and writes
    pub deletion_date: Option<DateTime<Utc>>,
}

impl Wallet {
    /// Create a new wallet for a user with a starting balance
    pub fn new(user_id: UserId, balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: WalletId::new(),
            user_id,
            balance,
            version: 1,
            creation_date: now,
            update_date: now,
            deletion_date: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deletion_date.is_some()
    }

    /// Validate wallet data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.balance < Decimal::ZERO {
            return Err("wallet balance cannot be negative");
        }
        if self.version < 1 {
            return Err("wallet version starts at 1");
        }
        Ok(())
    }
}
