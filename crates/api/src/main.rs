//! PiCamera Server - Main Entry Point

use anyhow::Context;
use api::{create_router, init_logging, run_server, telemetry, AppConfig, AppState};
use camera_capture::{CameraDriver, LibcameraDriver, MockDriver};
use camera_session::CameraRegistry;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use storage::{LastConfigStore, ModuleCatalog};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "picam-server", version, about = "Raspberry Pi camera control and streaming server")]
struct Args {
    /// Interface to bind
    #[arg(long)]
    ip: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Configuration file (default: ./picam.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use simulated cameras instead of libcamera
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(ip) = args.ip {
        config.server.host = ip;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config.logging.level, config.logging.json);
    info!("=== PiCamera Server v{} ===", env!("CARGO_PKG_VERSION"));

    let driver: Arc<dyn CameraDriver> = if args.mock {
        warn!("Running with simulated cameras");
        Arc::new(MockDriver::single("imx708"))
    } else {
        Arc::new(LibcameraDriver::with_tools(
            config.tools.list.clone(),
            config.tools.still.clone(),
        ))
    };

    let catalog = match &config.paths.module_catalog {
        Some(path) => ModuleCatalog::load(path).context("loading camera module catalog")?,
        None => ModuleCatalog::builtin(),
    };
    let last_config = Arc::new(
        LastConfigStore::open(&config.paths.last_config)
            .context("opening last-known camera configuration")?,
    );

    let registry = Arc::new(
        CameraRegistry::discover(driver, config.session_settings(), last_config, &catalog)
            .await
            .context("discovering cameras")?,
    );

    let metrics = match telemetry::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("Metrics disabled: {}", e);
            None
        }
    };
    let sampler = telemetry::spawn_sampler(Arc::clone(&registry));

    let state = Arc::new(AppState::new(Arc::clone(&registry), metrics));
    let router = create_router(Arc::clone(&state));

    let shutdown_state = Arc::clone(&state);
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
        shutdown_state.begin_shutdown();
    };

    let served = run_server(&config.bind_addr(), router, shutdown).await;

    sampler.abort();
    registry.shutdown().await;
    info!("All cameras released");

    served.context("serving HTTP")?;
    Ok(())
}
