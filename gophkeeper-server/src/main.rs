//! Gophkeeper Server
//!
//! Stores encrypted user secrets and the metadata needed to reconcile them.
//! The server only ever handles opaque ciphertext: all encryption and
//! decryption happens on the client.

mod auth;
mod config;
mod error;
mod handlers;
mod server;
mod service;
mod storage;
mod token;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if cfg.storage != config::SQLITE_STORAGE_TYPE {
        anyhow::bail!("unknown storage type: {}", cfg.storage);
    }

    let storage = storage::ServerStorage::open(Path::new(&cfg.database_dsn))
        .context("failed to open server storage")?;
    let tokens = Arc::new(token::TokenManager::new(&cfg.token_secret_key));
    let service = service::GophkeeperService::new(storage, tokens);

    let app = server::build_router(service);
    let listener = tokio::net::TcpListener::bind(&cfg.server_address)
        .await
        .with_context(|| format!("failed to bind {}", cfg.server_address))?;

    tracing::info!("starting gophkeeper server on {}", cfg.server_address);

    let shutdown = CancellationToken::new();
    let serve_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { serve_shutdown.cancelled().await })
            .await
    });

    shutdown_signal().await;
    tracing::info!("server is shutting down...");
    shutdown.cancel();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(result) => result.context("server task panicked")??,
        Err(_) => tracing::warn!("graceful shutdown timeout exceeded"),
    }

    // Storage handles close when the router is dropped.
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
