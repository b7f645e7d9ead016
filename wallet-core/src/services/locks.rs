//! Per-wallet mutual exclusion
//!
//! Serializes mutations that touch the same wallet while letting disjoint
//! wallets proceed in parallel. Pair acquisition always locks the smaller
//! wallet id first, so two transfers going opposite directions between the
//! same wallets take the locks in the same global order and cannot deadlock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::domain::ids::WalletId;

type HeldLock = ArcMutexGuard<RawMutex, ()>;

/// Coordination held over one or two wallets; released when dropped, on
/// every exit path.
pub struct WalletGuard {
    _held: Vec<HeldLock>,
}

/// Table of per-wallet mutexes.
///
/// Entries are created on first touch and kept for the process lifetime, so
/// the table grows with the distinct-wallet population, not per operation.
pub struct WalletLocks {
    table: Mutex<HashMap<WalletId, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// The mutex for one wallet. The table lock is held only for the lookup,
    /// never while waiting on a wallet.
    fn slot(&self, wallet_id: WalletId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock();
        table.entry(wallet_id).or_default().clone()
    }

    pub fn acquire_single(&self, wallet_id: WalletId) -> WalletGuard {
        WalletGuard {
            _held: vec![self.slot(wallet_id).lock_arc()],
        }
    }

    /// Lock two wallets in ascending id order, whichever way they were passed
    pub fn acquire_pair(&self, a: WalletId, b: WalletId) -> WalletGuard {
        if a == b {
            return self.acquire_single(a);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let first_guard = self.slot(first).lock_arc();
        let second_guard = self.slot(second).lock_arc();
        WalletGuard {
            _held: vec![first_guard, second_guard],
        }
    }
}

impl Default for WalletLocks {
    fn default() -> Self {
        Self::new()
    }
}
