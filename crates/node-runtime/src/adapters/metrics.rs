//! Metric-recording wrappers around the RPC ports.
//!
//! [`InstrumentedCaller`] counts outbound calls by outcome and tracks the
//! pending-call gauge; [`InstrumentedDispatch`] counts inbound requests and
//! observes handler latency.

use async_trait::async_trait;
use rpc_bridge::{HandlerDispatch, HandlerResult, RequestContext, RpcCaller, RpcError, RpcRequest};
use serde_json::Value;
use shared_types::Response;
use std::time::Instant;

/// Metric label for an outbound call outcome.
pub fn call_outcome(result: &Result<Response, RpcError>) -> &'static str {
    match result {
        Ok(response) if response.is_error() => "error_reply",
        Ok(_) => "success",
        Err(RpcError::Timeout { .. }) => "timeout",
        Err(RpcError::Transport(_)) => "transport",
        Err(RpcError::Cancelled) | Err(RpcError::Shutdown) => "cancelled",
        Err(RpcError::Registry(_)) | Err(RpcError::Encode(_)) => "rejected",
    }
}

/// An [`RpcCaller`] with call metrics.
pub struct InstrumentedCaller<C> {
    inner: C,
}

impl<C> InstrumentedCaller<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: RpcCaller> RpcCaller for InstrumentedCaller<C> {
    async fn call(&self, request: RpcRequest) -> Result<Response, RpcError> {
        let _pending = node_telemetry::track_pending_call();
        let result = self.inner.call(request).await;
        node_telemetry::record_rpc_call(call_outcome(&result));
        result
    }
}

/// Handler dispatch with request metrics.
pub struct InstrumentedDispatch<D> {
    inner: D,
}

impl<D> InstrumentedDispatch<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<D: HandlerDispatch> HandlerDispatch for InstrumentedDispatch<D> {
    async fn invoke(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        let started = Instant::now();
        let result = self.inner.invoke(ctx, payload).await;
        let outcome = if result.is_ok() { "success" } else { "failure" };
        node_telemetry::record_dispatch(&ctx.operation, outcome, started.elapsed());
        result
    }
}
