//! Wallet Core - Business logic for the wallet ledger service
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Wallet, Transaction, User)
//! - **ports**: Trait definitions for external dependencies (LedgerStore)
//! - **services**: Business logic orchestration (engine, locks, seeding)
//! - **adapters**: Concrete implementations (SQLite)

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::sqlite::SqliteStore;
use ports::LedgerStore;
use services::{EngineLimits, LedgerEngine};

// Re-export commonly used types at crate root
pub use domain::ids::{UserId, WalletId};
pub use domain::result::{Error, Result};
pub use domain::{NewTransaction, Transaction, TransactionKind, User, Wallet};

/// Main context for wallet operations
///
/// This is the primary entry point for all business logic. It holds the
/// database-backed store and the mutation engine built on top of it.
pub struct WalletContext {
    pub store: Arc<SqliteStore>,
    pub engine: Arc<LedgerEngine>,
}

impl WalletContext {
    /// Open (or create) the database at `db_path` and wire up the engine
    pub fn new(db_path: &Path, limits: EngineLimits) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(db_path)?);
        let engine = Arc::new(LedgerEngine::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            limits,
        ));
        Ok(Self { store, engine })
    }

    /// In-memory context, for tests and local experiments
    pub fn open_in_memory(limits: EngineLimits) -> Result<Self> {
        let store = Arc::new(SqliteStore::open_in_memory()?);
        let engine = Arc::new(LedgerEngine::new(
            Arc::clone(&store) as Arc<dyn LedgerStore>,
            limits,
        ));
        Ok(Self { store, engine })
    }
}
