//! Request logging around handler dispatch.
//!
//! Logs the operation, a truncated payload preview and the correlation token
//! on entry, and the elapsed time on exit. Slow requests are logged at
//! `warn`.

use crate::domain::context::RequestContext;
use crate::ports::inbound::{HandlerDispatch, HandlerResult};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Payload preview length, in characters.
pub const PAYLOAD_MAX_CHARS: usize = 200;

/// Requests slower than this are logged at `warn`.
pub const SLOW_THRESHOLD: Duration = Duration::from_millis(500);

/// Wraps a [`HandlerDispatch`] with entry/exit logging.
pub struct LoggingInterceptor<D> {
    inner: D,
    slow_threshold: Duration,
    max_payload_chars: usize,
}

impl<D> LoggingInterceptor<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            slow_threshold: SLOW_THRESHOLD,
            max_payload_chars: PAYLOAD_MAX_CHARS,
        }
    }

    #[must_use]
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

/// Compact JSON of `payload`, cut to `max_chars` characters with a `...`
/// suffix when longer.
#[must_use]
pub fn payload_preview(payload: &Value, max_chars: usize) -> String {
    let text = payload.to_string();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}

#[async_trait]
impl<D: HandlerDispatch> HandlerDispatch for LoggingInterceptor<D> {
    async fn invoke(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        let correlation_id = ctx
            .correlation_token
            .as_ref()
            .map(|t| t.as_str())
            .unwrap_or("-");

        info!(
            operation = %ctx.operation,
            correlation_id = %correlation_id,
            payload = %payload_preview(&payload, self.max_payload_chars),
            "RPC request received"
        );

        let started = Instant::now();
        let result = self.inner.invoke(ctx, payload).await;
        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        let ok = result.is_ok();

        if elapsed > self.slow_threshold {
            warn!(
                operation = %ctx.operation,
                correlation_id = %correlation_id,
                elapsed_ms,
                ok,
                "Slow RPC request"
            );
        } else {
            info!(
                operation = %ctx.operation,
                correlation_id = %correlation_id,
                elapsed_ms,
                ok,
                "RPC request processed"
            );
        }

        result
    }
}
