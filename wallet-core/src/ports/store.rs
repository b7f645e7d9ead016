//! Storage port for wallets, the ledger, and identity lookups

use rust_decimal::Decimal;

use crate::domain::ids::{UserId, WalletId};
use crate::domain::result::Result;
use crate::domain::{NewTransaction, Transaction, User, Wallet};

/// One version-guarded balance write.
///
/// The store applies it only while the wallet's stored version still equals
/// `expected_version`; otherwise the whole commit fails with a conflict and
/// nothing is written.
#[derive(Debug, Clone)]
pub struct WalletWrite {
    pub wallet_id: WalletId,
    pub expected_version: i64,
    pub new_balance: Decimal,
}

/// Durable storage behind the ledger engine.
///
/// Balances are written exclusively through [`LedgerStore::commit`], which
/// couples the conditional updates and the ledger append into one
/// all-or-nothing unit.
pub trait LedgerStore: Send + Sync {
    // === Wallets ===

    fn wallet_by_id(&self, wallet_id: WalletId) -> Result<Option<Wallet>>;

    /// The single active wallet of a user. Zero or several active wallets is
    /// an error: this system assumes exactly one.
    fn wallet_by_user(&self, user_id: UserId) -> Result<Wallet>;

    fn create_wallet(&self, user_id: UserId, initial_balance: Decimal) -> Result<Wallet>;

    // === Ledger ===

    /// Apply every write and append exactly one record, atomically. A version
    /// conflict or missing wallet on any write aborts the whole unit.
    fn commit(&self, writes: &[WalletWrite], record: NewTransaction) -> Result<Transaction>;

    /// Records the user initiated, newest first
    fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>>;

    // === Users & tokens ===

    fn create_user(&self, username: &str) -> Result<User>;

    fn user_count(&self) -> Result<i64>;

    /// Batched username lookup for the history view
    fn users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>>;

    /// Resolve a bearer token to the user it was issued to
    fn user_by_token(&self, token: &str) -> Result<Option<UserId>>;

    fn issue_token(&self, user_id: UserId) -> Result<String>;
}
