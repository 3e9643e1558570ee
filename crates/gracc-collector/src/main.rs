// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use gracc_broker::{Broker, BrokerClient};
use gracc_collector::{build_app, AppState};
use gracc_stats::Stats;

#[derive(Parser, Debug)]
#[command(name = "gracc-collector", version, about = "Grid accounting record collector")]
struct Args {
    /// Path to a TOML config file; falls back to defaults plus env overrides
    /// when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raise the log level to debug regardless of config/env.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = gracc_config::load_config(args.config.as_deref())
        .with_context(|| "loading configuration")?;
    if args.debug {
        config.log_level = "debug".to_string();
    }
    gracc_config::validate_config(&config).with_context(|| "validating configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gracc={}", config.log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let stats = Arc::new(Stats::new());
    let broker: Arc<dyn Broker> = Arc::new(BrokerClient::spawn(config.amqp.clone()));
    let state = Arc::new(AppState {
        broker,
        stats,
        config: config.clone(),
    });

    let app = build_app(state);

    let host = if config.address.is_empty() {
        "0.0.0.0"
    } else {
        &config.address
    };
    let bind_addr = format!("{host}:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind {bind_addr}"))?;
    info!(bind = %bind_addr, "gracc-collector listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serve")
}

/// Waits for Ctrl+C or SIGTERM so the process can drain in-flight requests
/// and close the broker connection before exiting.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
    tracing::info!("shutdown signal received, draining");
}
