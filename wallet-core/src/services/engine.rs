//! The ledger mutation engine
//!
//! Every balance mutation runs the same shape: validate the request, take
//! the wallet lock(s), read current state, re-validate against it, then
//! commit the conditional write(s) together with one ledger record as a
//! single atomic unit. A version conflict inside the commit restarts the
//! read-compute-write cycle, bounded by [`EngineLimits::max_attempts`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::ids::{UserId, WalletId};
use crate::domain::result::{Error, Result};
use crate::domain::{NewTransaction, Transaction, TransactionKind, Wallet};
use crate::ports::{LedgerStore, WalletWrite};
use crate::services::locks::WalletLocks;

/// Default bound on read-compute-write attempts per mutation
const MAX_ATTEMPTS: u32 = 5;

/// Backoff after the first conflict, doubling per attempt: 25, 50, 100, 200ms
const INITIAL_BACKOFF_MS: u64 = 25;

/// Default ceiling on a single operation's amount
const MAX_AMOUNT: i64 = 10_000_000;

/// Tunable bounds for engine operations
#[derive(Debug, Clone)]
pub struct EngineLimits {
    /// Largest amount a single deposit, withdrawal, or transfer may move
    pub max_amount: Decimal,
    /// How many conflicting attempts before giving up with
    /// [`Error::ConcurrencyExhausted`]
    pub max_attempts: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_amount: Decimal::from(MAX_AMOUNT),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

/// Balances and record id produced by a committed transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutcome {
    pub transaction_id: i64,
    pub sender_balance: Decimal,
    pub receiver_balance: Decimal,
}

/// Orchestrates all balance mutations and reads.
///
/// Holds the storage port and the per-wallet lock table; construct one per
/// process and share it behind an `Arc`.
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
    locks: WalletLocks,
    limits: EngineLimits,
}

impl LedgerEngine {
    pub fn new(store: Arc<dyn LedgerStore>, limits: EngineLimits) -> Self {
        Self {
            store,
            locks: WalletLocks::new(),
            limits,
        }
    }

    // === Mutations ===

    /// Add `amount` to the wallet and append a `deposit` record.
    /// Returns the new balance.
    pub fn deposit(&self, wallet_id: WalletId, amount: Decimal) -> Result<Decimal> {
        self.check_amount(amount)?;
        let _held = self.locks.acquire_single(wallet_id);
        self.with_retry(|| {
            let wallet = self.fetch_wallet(wallet_id)?;
            let new_balance = checked_add(wallet.balance, amount)?;
            self.store.commit(
                &[WalletWrite {
                    wallet_id,
                    expected_version: wallet.version,
                    new_balance,
                }],
                NewTransaction::self_referential(
                    TransactionKind::Deposit,
                    wallet.user_id,
                    wallet_id,
                    amount,
                ),
            )?;
            Ok(new_balance)
        })
    }

    /// Subtract `amount` from the wallet and append a `withdraw` record.
    /// The balance check runs against the freshly read state on every
    /// attempt, so a retry cannot overdraw. Returns the new balance.
    pub fn withdraw(&self, wallet_id: WalletId, amount: Decimal) -> Result<Decimal> {
        self.check_amount(amount)?;
        let _held = self.locks.acquire_single(wallet_id);
        self.with_retry(|| {
            let wallet = self.fetch_wallet(wallet_id)?;
            if amount > wallet.balance {
                return Err(Error::InsufficientFunds {
                    wallet: wallet_id,
                    balance: wallet.balance,
                    requested: amount,
                });
            }
            let new_balance = wallet.balance - amount;
            self.store.commit(
                &[WalletWrite {
                    wallet_id,
                    expected_version: wallet.version,
                    new_balance,
                }],
                NewTransaction::self_referential(
                    TransactionKind::Withdraw,
                    wallet.user_id,
                    wallet_id,
                    amount,
                ),
            )?;
            Ok(new_balance)
        })
    }

    /// Move `amount` between two wallets and append one `transfer` record.
    ///
    /// Ownership of both wallets is verified here, once, against the state
    /// read under the locks. Both balance writes and the record are one
    /// commit unit; nothing is ever half-applied.
    pub fn transfer(
        &self,
        sender_user_id: UserId,
        sender_wallet_id: WalletId,
        receiver_user_id: UserId,
        receiver_wallet_id: WalletId,
        amount: Decimal,
    ) -> Result<TransferOutcome> {
        self.check_amount(amount)?;
        if sender_wallet_id == receiver_wallet_id {
            return Err(Error::SelfTransfer(sender_wallet_id));
        }
        let _held = self.locks.acquire_pair(sender_wallet_id, receiver_wallet_id);
        self.with_retry(|| {
            let sender = self.fetch_wallet(sender_wallet_id)?;
            let receiver = self.fetch_wallet(receiver_wallet_id)?;
            check_owner(&sender, sender_user_id)?;
            check_owner(&receiver, receiver_user_id)?;
            if amount > sender.balance {
                return Err(Error::InsufficientFunds {
                    wallet: sender_wallet_id,
                    balance: sender.balance,
                    requested: amount,
                });
            }
            let sender_after = sender.balance - amount;
            let receiver_after = checked_add(receiver.balance, amount)?;
            let committed = self.store.commit(
                &[
                    WalletWrite {
                        wallet_id: sender_wallet_id,
                        expected_version: sender.version,
                        new_balance: sender_after,
                    },
                    WalletWrite {
                        wallet_id: receiver_wallet_id,
                        expected_version: receiver.version,
                        new_balance: receiver_after,
                    },
                ],
                NewTransaction::transfer(
                    sender_user_id,
                    sender_wallet_id,
                    receiver_user_id,
                    receiver_wallet_id,
                    amount,
                ),
            )?;
            Ok(TransferOutcome {
                transaction_id: committed.id,
                sender_balance: sender_after,
                receiver_balance: receiver_after,
            })
        })
    }

    // === Queries ===

    /// Current balance; does not take the wallet lock
    pub fn balance(&self, wallet_id: WalletId) -> Result<Decimal> {
        Ok(self.fetch_wallet(wallet_id)?.balance)
    }

    /// Ledger records the user initiated, newest first
    pub fn transactions_by_user(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        self.store.transactions_by_user(user_id)
    }

    // === Internals ===

    /// Rerun `op` while it fails with a version conflict, up to the attempt
    /// bound, backing off in between. Any other result passes straight
    /// through.
    fn with_retry<T>(&self, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;
        loop {
            match op() {
                Err(err) if err.is_retryable() => {
                    attempts += 1;
                    if attempts >= self.limits.max_attempts {
                        return Err(Error::ConcurrencyExhausted { attempts });
                    }
                    thread::sleep(Duration::from_millis(
                        INITIAL_BACKOFF_MS * 2u64.pow(attempts - 1),
                    ));
                }
                other => return other,
            }
        }
    }

    fn check_amount(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(Error::invalid_amount(format!(
                "amount must be positive, got {amount}"
            )));
        }
        if amount > self.limits.max_amount {
            return Err(Error::invalid_amount(format!(
                "amount {amount} exceeds the ceiling of {}",
                self.limits.max_amount
            )));
        }
        Ok(())
    }

    fn fetch_wallet(&self, wallet_id: WalletId) -> Result<Wallet> {
        self.store
            .wallet_by_id(wallet_id)?
            .ok_or_else(|| Error::wallet_not_found(wallet_id.to_string()))
    }
}

fn check_owner(wallet: &Wallet, user_id: UserId) -> Result<()> {
    if wallet.user_id != user_id {
        return Err(Error::UserMismatch {
            user: user_id,
            wallet: wallet.id,
        });
    }
    Ok(())
}

fn checked_add(balance: Decimal, amount: Decimal) -> Result<Decimal> {
    balance
        .checked_add(amount)
        .ok_or_else(|| Error::invalid_amount(format!("balance overflow adding {amount}")))
}
