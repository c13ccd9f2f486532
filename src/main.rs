//! Exchange emulator entry point: config, logging, four listeners,
//! graceful shutdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use exchange_emulator::config::Config;
use exchange_emulator::exchange::{Registry, SessionSettings};
use exchange_emulator::logging;
use exchange_emulator::server::{api, info as exchange_info, notifications, streams, AppState, StreamKind};

#[derive(Parser)]
#[command(name = "exchange-emulator", version, about = "Spot exchange emulator over historical klines")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run the emulator servers.
    Serve {
        /// Path to the TOML config file.
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Cmd::Serve { config } => serve(&config).await,
    }
}

async fn serve(config_path: &PathBuf) -> Result<()> {
    let cfg = Config::load(config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    logging::init(&cfg.log);
    info!(config = %config_path.display(), "exchange emulator starting");

    // Fatal if unreadable: the blob is served verbatim for the lifetime of
    // the process.
    exchange_info::load(&cfg.exchange.info_file).context("load exchange info")?;

    let cancel = CancellationToken::new();
    let settings = SessionSettings {
        commission: cfg.commission_rate().context("commission")?,
        kline_file: cfg.parser.file.clone(),
        listener_delay: cfg.listener_delay(),
        offset: cfg.parser.offset,
    };
    let registry = Registry::new(settings, cancel.clone());
    let state = AppState {
        registry,
        disable_auth: cfg.api.disable_auth,
    };

    let listeners = [
        ("api", cfg.api.addr.clone(), api::router(state.clone())),
        (
            "notifications",
            cfg.api.notifications_addr.clone(),
            notifications::router(state.clone()),
        ),
        (
            "orders stream",
            cfg.ws.orders_addr.clone(),
            streams::router(state.clone(), StreamKind::Orders),
        ),
        (
            "prices stream",
            cfg.ws.prices_addr.clone(),
            streams::router(state.clone(), StreamKind::Prices),
        ),
    ];

    let mut servers = Vec::new();
    for (name, addr, router) in listeners {
        let listener = TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("bind {name} listener on {addr}"))?;
        info!(%addr, "serving {name}");
        let token = cancel.clone();
        servers.push(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
        }));
    }
    info!("service ready");

    tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
    info!("shutting down");
    cancel.cancel();

    let drained = tokio::time::timeout(
        cfg.graceful_shutdown_delay(),
        futures_util::future::join_all(servers),
    )
    .await;
    if drained.is_err() {
        warn!("graceful shutdown timed out");
        std::process::exit(1);
    }

    Ok(())
}
