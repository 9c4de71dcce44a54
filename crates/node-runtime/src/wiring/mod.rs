//! # Node Wiring
//!
//! Connects the broker, the outbound client and the inbound dispatcher.
//!
//! ```text
//!   broker ──► Dispatcher(service queue)
//!                 └─► InstrumentedDispatch
//!                       └─► LoggingInterceptor
//!                             └─► OperationRouter
//!                                   ├─ health.check
//!                                   └─ example.members ──► InstrumentedCaller
//!                                                            └─► RpcClient ──► broker
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Open the client channel and start the [`RpcClient`] (reply queue and
//!    reply consumer)
//! 2. Build the operation router
//! 3. Open the dispatch channel and start the [`Dispatcher`]
//!
//! ## Shutdown Sequence
//!
//! 1. Stop dispatching (in-flight requests finish)
//! 2. Stop the reply consumer and cancel pending calls
//! 3. Close both channels
//! 4. Log a final metrics snapshot

use crate::adapters::{InstrumentedCaller, InstrumentedDispatch};
use crate::container::NodeConfig;
use crate::handlers::build_router;
use anyhow::{Context, Result};
use rpc_bridge::{Dispatcher, DispatcherConfig, LoggingInterceptor, RpcClient};
use shared_bus::{BrokerChannel, BrokerConnector};
use std::sync::Arc;
use tracing::{info, warn};

/// A running node.
pub struct NodeRuntime {
    config: NodeConfig,
    client: Arc<RpcClient>,
    dispatcher: Dispatcher,
    dispatch_channel: Arc<dyn BrokerChannel>,
}

impl NodeRuntime {
    /// Connect to the configured broker and start serving.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let connector = shared_bus::connect(&config.broker_url)
            .with_context(|| format!("Failed to connect to broker at {}", config.broker_url))?;
        Self::start_with_connector(config, connector).await
    }

    /// Start serving over an existing broker connection.
    pub async fn start_with_connector(
        config: NodeConfig,
        connector: Arc<dyn BrokerConnector>,
    ) -> Result<Self> {
        info!(
            service = %config.service_name,
            version = %config.service_version,
            queue = %config.service_queue,
            "Starting node runtime"
        );

        node_telemetry::register_metrics().context("Failed to register metrics")?;

        let client_channel = connector
            .open_channel()
            .await
            .context("Failed to open RPC client channel")?;
        let client = Arc::new(
            RpcClient::start(client_channel, config.rpc_client_config())
                .await
                .context("Failed to start RPC client")?,
        );

        let caller = Arc::new(InstrumentedCaller::new(Arc::clone(&client)));
        let router = build_router(&config, caller).context("Failed to build operation router")?;
        info!(operations = ?router.operations(), "Operations registered");
        let handler = Arc::new(InstrumentedDispatch::new(LoggingInterceptor::new(router)));

        let dispatch_channel = connector
            .open_channel()
            .await
            .context("Failed to open dispatch channel")?;
        let dispatcher = Dispatcher::start(
            Arc::clone(&dispatch_channel),
            handler,
            DispatcherConfig::new(config.service_queue.as_str())
                .with_max_in_flight(config.dispatch_max_in_flight),
        )
        .await
        .context("Failed to start dispatcher")?;

        info!(
            queue = %dispatcher.queue(),
            reply_queue = %client.reply_queue(),
            "Node runtime started"
        );

        Ok(Self {
            config,
            client,
            dispatcher,
            dispatch_channel,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The outbound client, for calling other services.
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Node metrics in the Prometheus text format.
    pub fn metrics_snapshot(&self) -> Result<String> {
        node_telemetry::gather_metrics().context("Failed to gather metrics")
    }

    /// Graceful shutdown.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.dispatcher.shutdown().await;
        self.client.shutdown().await;
        if let Err(e) = self.dispatch_channel.close().await {
            warn!(error = %e, "Failed to close dispatch channel");
        }

        match self.metrics_snapshot() {
            Ok(snapshot) => info!(metrics = %snapshot, "Final metrics snapshot"),
            Err(e) => warn!(error = %e, "Failed to gather final metrics"),
        }

        info!("Shutdown complete");
    }
}
