//! Outbound port: calling another service over the broker.

use crate::domain::error::RpcError;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::Response;
use std::sync::Arc;
use std::time::Duration;

/// One outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    /// Work queue of the target service.
    pub target_queue: String,
    pub operation: String,
    pub payload: Value,
    /// Overrides the client's default timeout.
    pub timeout: Option<Duration>,
}

impl RpcRequest {
    pub fn new(
        target_queue: impl Into<String>,
        operation: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            target_queue: target_queue.into(),
            operation: operation.into(),
            payload,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Request/reply over the broker.
///
/// Resolves with the reply envelope, success or error alike. `Err` means no
/// reply was obtained: timeout, transport failure or shutdown.
#[async_trait]
pub trait RpcCaller: Send + Sync {
    async fn call(&self, request: RpcRequest) -> Result<Response, RpcError>;
}

#[async_trait]
impl<T: RpcCaller + ?Sized> RpcCaller for Arc<T> {
    async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        (**self).call(request).await
    }
}
