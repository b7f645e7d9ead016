//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. The engine owns
//! every balance mutation; locks keep concurrent mutations of the same
//! wallet ordered; seeding fills an empty database with demo accounts.

mod engine;
mod locks;
mod seed;

pub use engine::{EngineLimits, LedgerEngine, TransferOutcome};
pub use locks::{WalletGuard, WalletLocks};
pub use seed::{seed_demo, SeededUser};
