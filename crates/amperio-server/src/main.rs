//! Amperio - real-time guitar effects processor with a WebSocket control
//! surface.

mod controller;
mod protocol;
mod server;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use amperio_engine::{EngineConfig, DRIVER_NAMES};

use crate::controller::EngineController;
use crate::server::ServerState;

#[derive(Parser)]
#[command(name = "amperio")]
#[command(author, version, about = "Real-time guitar effects processor", long_about = None)]
struct Cli {
    /// Audio driver: auto, WASAPI, ASIO, CoreAudio, or PipeWire
    #[arg(default_value = "auto")]
    driver: String,

    /// WebSocket control port
    #[arg(long, default_value = "8765")]
    port: u16,

    /// Requested sample rate in Hz
    #[arg(long, default_value = "48000")]
    sample_rate: u32,

    /// Requested buffer size in frames
    #[arg(long, default_value = "64")]
    buffer_size: u32,

    /// List the driver names this build understands and exit
    #[arg(long)]
    list_drivers: bool,
}

fn main() -> ExitCode {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    if cli.list_drivers {
        for name in DRIVER_NAMES {
            println!("{name}");
        }
        return ExitCode::SUCCESS;
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "fatal");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig {
        driver: cli.driver.clone(),
        sample_rate: cli.sample_rate,
        buffer_size: cli.buffer_size,
    };

    info!(driver = %cli.driver, "initializing audio engine");
    let controller = EngineController::spawn(config)?;

    let sample_rate = controller.handle().sample_rate();
    let buffer_size = controller.handle().buffer_size();
    info!(
        sample_rate,
        buffer_size,
        latency_ms = f64::from(buffer_size) / f64::from(sample_rate.max(1)) * 1000.0,
        "audio ready"
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let state = Arc::new(ServerState::new(controller));

    server::run(addr, state, shutdown_signal()).await?;

    info!("shut down cleanly");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(%err, "failed to install SIGINT handler");
        }
    };

    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    error!(%err, "failed to install SIGTERM handler");
                    ctrl_c.await;
                    return;
                }
            };
        tokio::select! {
            () = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    info!("shutdown signal received");
}
