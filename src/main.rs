use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::signal;
use tracing::{error, info, warn};

use widgate::core::config::{Config, TransportSource};
use widgate::core::startup::{build_pipeline, open_registry};
use widgate::core::tracing_init::init_tracing;
use widgate::transport::serial::open_serial;
use widgate::transport::session::run_session;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("config.toml")
    };

    // Load and validate configuration
    let config = Config::from_file(&config_path).context(format!(
        "Failed to load configuration from '{}'. \
        If this is your first run, copy config.example.toml to config.toml and adjust the values.",
        config_path.display()
    ))?;

    init_tracing(&config.logging)?;

    // Messages are handled strictly one at a time
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;

    runtime.block_on(async_main(config, config_path))
}

async fn async_main(config: Config, config_path: PathBuf) -> Result<()> {
    info!(
        config_path = %config_path.display(),
        source = ?config.transport.source,
        device = %config.transport.device.display(),
        baud_rate = config.transport.baud_rate,
        capture_mode = ?config.capture.mode,
        log_level = %config.logging.level,
        log_format = %config.logging.format,
        "WID verifier starting"
    );

    let registry = open_registry(&config)?;
    let mut pipeline = build_pipeline(&config, registry)?;

    let reader: Box<dyn AsyncBufRead + Unpin> = match config.transport.source {
        TransportSource::Device => {
            let port = open_serial(&config.transport)?;
            Box::new(BufReader::new(port))
        }
        TransportSource::Stdin => {
            info!("Reading messages from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    info!(
        users = pipeline.registry().len(),
        "WID verifier startup complete, waiting for messages"
    );

    let outcome = run_session(reader, &mut pipeline, shutdown_signal()).await;

    let snapshot = pipeline.metrics().get_snapshot();
    info!(
        total = snapshot.total_verifications,
        accepted = snapshot.accepted,
        rejected = snapshot.rejected,
        acceptance_rate = snapshot.acceptance_rate,
        rejections = ?snapshot.rejections_by_kind,
        uptime_seconds = snapshot.uptime_seconds,
        "Verification totals"
    );

    match outcome {
        Ok(summary) => {
            info!(
                messages = summary.messages,
                accepted = summary.accepted,
                "Session ended, shutting down gracefully"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Session aborted");
            Err(e)
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
