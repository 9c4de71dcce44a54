//! # Node Runtime
//!
//! Serves this node's operations over the broker until Ctrl-C.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (logging subscriber, metrics registry)
//! 2. Load configuration from the environment
//! 3. Connect to the broker and start the RPC client and dispatcher
//! 4. Wait for Ctrl-C, then shut down gracefully

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use node_telemetry::{init_telemetry, TelemetryConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry =
        init_telemetry(TelemetryConfig::from_env()).context("Failed to initialize telemetry")?;

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    let runtime = NodeRuntime::start(config).await?;

    info!("Node running. Press Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }

    runtime.shutdown().await;
    Ok(())
}
