//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - SQLite (embedded) for the LedgerStore port

pub mod sqlite;
