//! Long-lived RPC client.
//!
//! One channel and one reply queue shared by every call. Calls are
//! correlated through the [`CorrelationRegistry`]; the [`ReplyConsumer`]
//! resolves them as replies arrive.

use crate::domain::config::RpcClientConfig;
use crate::domain::correlation::CorrelationToken;
use crate::domain::error::RpcError;
use crate::domain::pending::CorrelationRegistry;
use crate::ipc::codec;
use crate::ipc::reply_consumer::ReplyConsumer;
use crate::ports::outbound::{RpcCaller, RpcRequest};
use async_trait::async_trait;
use shared_bus::{BrokerChannel, TransportError};
use shared_types::Response;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// RPC client over a shared channel.
pub struct RpcClient {
    channel: Arc<dyn BrokerChannel>,
    registry: CorrelationRegistry,
    replies: ReplyConsumer,
    /// Serializes publishes on the shared channel.
    publish_lock: Mutex<()>,
    config: RpcClientConfig,
    closed: AtomicBool,
}

impl RpcClient {
    /// Declare the reply queue and start the reply consumer.
    ///
    /// # Errors
    ///
    /// Propagates the transport error if the reply path cannot be set up.
    pub async fn start(
        channel: Arc<dyn BrokerChannel>,
        config: RpcClientConfig,
    ) -> Result<Self, TransportError> {
        let registry = CorrelationRegistry::new();
        let replies = ReplyConsumer::start(
            Arc::clone(&channel),
            registry.clone(),
            config.reply_backoff.clone(),
        )
        .await?;

        info!(
            reply_queue = %replies.queue(),
            default_timeout_ms = config.default_timeout.as_millis(),
            "RPC client started"
        );

        Ok(Self {
            channel,
            registry,
            replies,
            publish_lock: Mutex::new(()),
            config,
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    #[must_use]
    pub fn reply_queue(&self) -> String {
        self.replies.queue()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    #[must_use]
    pub fn config(&self) -> &RpcClientConfig {
        &self.config
    }

    /// Publish `request` and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if no reply arrives in time
    /// - [`RpcError::Transport`] if the request cannot be published
    /// - [`RpcError::Shutdown`] after [`shutdown`](Self::shutdown)
    #[instrument(skip(self, request), fields(operation = %request.operation, queue = %request.target_queue))]
    pub async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RpcError::Shutdown);
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let token = CorrelationToken::generate();
        let message = codec::encode_request(&request, &token, &self.replies.queue(), timeout)?;

        let pending = self.registry.register(token.clone(), timeout)?;

        {
            let _guard = self.publish_lock.lock().await;
            if let Err(e) = self.channel.publish(&request.target_queue, message).await {
                error!(correlation_id = %token, error = %e, "Failed to publish RPC request");
                self.registry.cancel(&token);
                return Err(RpcError::Transport(e));
            }
        }

        debug!(correlation_id = %token, "RPC request published");
        pending.wait().await
    }

    /// Stop the reply consumer, cancel pending calls and close the channel.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.replies.shutdown().await;

        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            info!(count = cancelled, "Cancelled pending RPC calls on shutdown");
        }

        if let Err(e) = self.channel.close().await {
            error!(error = %e, "Failed to close RPC client channel");
        }
        info!("RPC client stopped");
    }
}

#[async_trait]
impl RpcCaller for RpcClient {
    async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        RpcClient::call(self, request).await
    }
}
