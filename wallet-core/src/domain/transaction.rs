//! Ledger record domain model
//!
//! A `Transaction` is the immutable audit record of one committed balance
//! mutation. Deposits and withdrawals are self-referential (sender equals
//! receiver); transfers name two distinct wallets.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ids::{UserId, WalletId};

/// What kind of money movement a ledger record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Transfer => "transfer",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(Self::Deposit),
            "withdraw" => Ok(Self::Withdraw),
            "transfer" => Ok(Self::Transfer),
            other => Err(format!("unknown transaction kind: {other}")),
        }
    }
}

/// A committed, immutable ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Assigned by the store at append time
    pub id: i64,
    pub sender_user_id: UserId,
    pub sender_wallet_id: WalletId,
    pub receiver_user_id: UserId,
    pub receiver_wallet_id: WalletId,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
    pub deletion_date: Option<DateTime<Utc>>,
}

/// A ledger record about to be appended; id and timestamps are assigned by
/// the store inside the commit.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub sender_user_id: UserId,
    pub sender_wallet_id: WalletId,
    pub receiver_user_id: UserId,
    pub receiver_wallet_id: WalletId,
    pub amount: Decimal,
    pub kind: TransactionKind,
}

impl NewTransaction {
    /// Record for a deposit or withdrawal: both sides are the same wallet
    pub fn self_referential(
        kind: TransactionKind,
        user_id: UserId,
        wallet_id: WalletId,
        amount: Decimal,
    ) -> Self {
        Self {
            sender_user_id: user_id,
            sender_wallet_id: wallet_id,
            receiver_user_id: user_id,
            receiver_wallet_id: wallet_id,
            amount,
            kind,
        }
    }

    /// Record for a transfer between two wallets
    pub fn transfer(
        sender_user_id: UserId,
        sender_wallet_id: WalletId,
        receiver_user_id: UserId,
        receiver_wallet_id: WalletId,
        amount: Decimal,
    ) -> Self {
        Self {
            sender_user_id,
            sender_wallet_id,
            receiver_user_id,
            receiver_wallet_id,
            amount,
            kind: TransactionKind::Transfer,
        }
    }

    /// Validate record data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount <= Decimal::ZERO {
            return Err("transaction amount must be positive");
        }
        match self.kind {
            TransactionKind::Transfer => {
                if self.sender_wallet_id == self.receiver_wallet_id {
                    return Err("transfer cannot target its own wallet");
                }
            }
            TransactionKind::Deposit | TransactionKind::Withdraw => {
                if self.sender_wallet_id != self.receiver_wallet_id
                    || self.sender_user_id != self.receiver_user_id
                {
                    return Err("deposit/withdraw records must be self-referential");
                }
            }
        }
        Ok(())
    }
}
