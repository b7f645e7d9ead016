//! Process configuration from environment variables
//!
//! Every setting has a workable default, so a bare `walletd` starts a local
//! instance. A `.env` file is honored when present (loaded in `main`).

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DATABASE_PATH: &str = "wallet.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    /// Create demo users with funded wallets on an empty database
    pub seed_demo: bool,
}

impl Config {
    /// Read configuration from the environment:
    /// `WALLET_BIND_ADDR`, `WALLET_DATABASE_PATH`, `WALLET_SEED_DEMO`
    pub fn from_env() -> Result<Self> {
        let raw_addr =
            std::env::var("WALLET_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse()
            .with_context(|| format!("invalid WALLET_BIND_ADDR: {raw_addr}"))?;

        let database_path = std::env::var("WALLET_DATABASE_PATH")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string())
            .into();

        let seed_demo = truthy(std::env::var("WALLET_SEED_DEMO").ok().as_deref());

        Ok(Self {
            bind_addr,
            database_path,
            seed_demo,
        })
    }
}

fn truthy(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "1" | "yes" | "TRUE" | "YES"))
}
