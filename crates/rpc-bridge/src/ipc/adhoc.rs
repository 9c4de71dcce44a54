//! Ad-hoc RPC client.
//!
//! Opens a fresh channel and exclusive reply queue for every call and tears
//! them down when the call ends, however it ends. No state is shared between
//! calls, so there is nothing to correlate beyond matching the one token on
//! the private reply queue.

use crate::domain::config::RpcClientConfig;
use crate::domain::correlation::CorrelationToken;
use crate::domain::error::RpcError;
use crate::ipc::codec;
use crate::ports::outbound::{RpcCaller, RpcRequest};
use async_trait::async_trait;
use shared_bus::{BrokerChannel, BrokerConnector, ConsumeOptions, TransportError};
use shared_types::Response;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Closes its channel on drop.
struct ChannelGuard {
    channel: Arc<dyn BrokerChannel>,
    closed: bool,
}

impl ChannelGuard {
    fn new(channel: Arc<dyn BrokerChannel>) -> Self {
        Self {
            channel,
            closed: false,
        }
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.channel.close().await {
            warn!(error = %e, "Failed to close ad-hoc channel");
        }
    }
}

impl Deref for ChannelGuard {
    type Target = dyn BrokerChannel;

    fn deref(&self) -> &Self::Target {
        self.channel.as_ref()
    }
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let channel = Arc::clone(&self.channel);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = channel.close().await {
                    debug!(error = %e, "Failed to close abandoned ad-hoc channel");
                }
            });
        }
    }
}

/// RPC client with a channel per call.
pub struct AdHocRpcClient {
    connector: Arc<dyn BrokerConnector>,
    config: RpcClientConfig,
}

impl AdHocRpcClient {
    #[must_use]
    pub fn new(connector: Arc<dyn BrokerConnector>, config: RpcClientConfig) -> Self {
        Self { connector, config }
    }

    /// Publish `request` on a private channel and wait for its reply.
    ///
    /// # Errors
    ///
    /// - [`RpcError::Timeout`] if no reply arrives in time
    /// - [`RpcError::Transport`] if the channel, reply queue or publish fails
    #[instrument(skip(self, request), fields(operation = %request.operation, queue = %request.target_queue))]
    pub async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let channel = ChannelGuard::new(self.connector.open_channel().await?);

        let reply_queue = channel.declare_exclusive_queue().await?;
        let mut replies = channel
            .consume(&reply_queue, ConsumeOptions::no_ack())
            .await?;

        let token = CorrelationToken::generate();
        let message = codec::encode_request(&request, &token, &reply_queue, timeout)?;
        channel.publish(&request.target_queue, message).await?;
        debug!(correlation_id = %token, reply_queue = %reply_queue, "Ad-hoc RPC request published");

        let wait = async {
            while let Some(delivery) = replies.recv().await {
                if delivery.properties.correlation_id.as_deref() == Some(token.as_str()) {
                    return Ok(codec::decode_reply(&delivery.body));
                }
                warn!(
                    correlation_id = ?delivery.properties.correlation_id,
                    "Unexpected reply on ad-hoc queue dropped"
                );
            }
            Err(RpcError::Transport(TransportError::ChannelClosed))
        };
        let outcome = tokio::time::timeout(timeout, wait).await;

        channel.close().await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    correlation_id = %token,
                    timeout_ms = timeout.as_millis(),
                    "Ad-hoc RPC call timed out"
                );
                Err(RpcError::Timeout { token, timeout })
            }
        }
    }
}

#[async_trait]
impl RpcCaller for AdHocRpcClient {
    async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        AdHocRpcClient::call(self, request).await
    }
}
