//! Gophkeeper Client
//!
//! Interactive terminal client: owns the master passphrase, performs all
//! encryption locally, keeps an offline-capable replica of the user's
//! secrets and reconciles it with the server on a timer.

mod backend;
mod config;
mod controller;
mod error;
mod storage;
mod sync;
#[cfg(test)]
mod testutil;
mod view;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const SYNC_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::ClientConfig::parse();

    // The interactive menu owns stdout; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let base_dir = cfg
        .resolve_base_dir()
        .context("failed to create the base directory")?;
    let local =
        storage::LocalStorage::open(&base_dir).context("failed to open the local storage")?;
    let remote: Arc<dyn backend::RemoteStore> = Arc::new(
        backend::HttpBackendClient::new(&cfg.server_url(), cfg.enable_https)
            .context("failed to build the backend client")?,
    );

    let controller = Arc::new(controller::Controller::new(remote, local));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let sync_task = sync::spawn_periodic(
        controller.clone(),
        Duration::from_secs(cfg.sync_period),
        cancel.clone(),
    );

    let result = view::run(controller, cancel.clone()).await;

    // Bounded wait for the in-flight sync before exiting.
    cancel.cancel();
    if tokio::time::timeout(SYNC_SHUTDOWN_TIMEOUT, sync_task)
        .await
        .is_err()
    {
        tracing::info!("synchronization shutdown timeout exceeded");
    }

    result.context("terminal session failed")
}
