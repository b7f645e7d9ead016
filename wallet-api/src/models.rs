//! Request and response bodies

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use wallet_core::services::TransferOutcome;
use wallet_core::{Transaction, TransactionKind, UserId, WalletId};

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub receiver_user_id: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    pub balance: Decimal,
}

impl MutationResponse {
    pub fn ok(balance: Decimal) -> Self {
        Self {
            status: "ok",
            balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub status: &'static str,
    pub transaction_id: i64,
    pub sender_balance: Decimal,
    pub receiver_balance: Decimal,
}

impl TransferResponse {
    pub fn ok(outcome: TransferOutcome) -> Self {
        Self {
            status: "ok",
            transaction_id: outcome.transaction_id,
            sender_balance: outcome.sender_balance,
            receiver_balance: outcome.receiver_balance,
        }
    }
}

/// One history entry, decorated with the receiver's username
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: i64,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub sender_wallet_id: WalletId,
    pub receiver_wallet_id: WalletId,
    pub receiver_username: String,
    pub creation_date: DateTime<Utc>,
}

impl TransactionView {
    pub fn from_record(record: &Transaction, usernames: &HashMap<UserId, String>) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            amount: record.amount,
            sender_wallet_id: record.sender_wallet_id,
            receiver_wallet_id: record.receiver_wallet_id,
            receiver_username: usernames
                .get(&record.receiver_user_id)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
            creation_date: record.creation_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionView>,
}
