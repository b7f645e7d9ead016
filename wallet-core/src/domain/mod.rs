//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod ids;
pub mod result;
mod transaction;
mod user;
mod wallet;

pub use transaction::{NewTransaction, Transaction, TransactionKind};
pub use user::User;
pub use wallet::Wallet;
