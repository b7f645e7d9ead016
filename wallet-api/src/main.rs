//! walletd - HTTP surface for the wallet ledger service
//!
//! Thin async shell around the synchronous `wallet-core` engine: resolve
//! configuration, open the database, optionally seed demo accounts, serve.

mod auth;
mod config;
mod error;
mod models;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallet_core::services::{seed_demo, EngineLimits};
use wallet_core::WalletContext;

use crate::config::Config;
use crate::routes::create_router;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenv();
    init_tracing();

    let config = Config::from_env()?;
    info!(db = %config.database_path.display(), "Opening wallet database");

    let ctx = Arc::new(WalletContext::new(
        &config.database_path,
        EngineLimits::default(),
    )?);

    if config.seed_demo {
        let seeded = seed_demo(ctx.store.as_ref())?;
        if seeded.is_empty() {
            info!("Demo seeding skipped, users already exist");
        }
        for entry in &seeded {
            info!(
                username = %entry.username,
                user_id = %entry.user_id,
                wallet_id = %entry.wallet_id,
                token = %entry.token,
                "Seeded demo account"
            );
        }
    }

    let app = create_router(ctx);

    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("API server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walletd=info,wallet_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
