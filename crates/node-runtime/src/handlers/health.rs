//! `health.check`: liveness check over the broker.

use rpc_bridge::{handler_fn, HandlerOutput, OperationHandler};
use serde_json::json;
use shared_types::envelope::success;
use std::sync::Arc;

pub const HEALTH_CHECK: &str = "health.check";

/// Replies `{status: "ok", service, version}`.
pub fn health_check(service: String, version: String) -> Arc<dyn OperationHandler> {
    handler_fn(move |ctx, _payload| {
        let body = json!({ "status": "ok", "service": service, "version": version });
        async move {
            Ok(HandlerOutput::Envelope(success(
                body,
                None,
                ctx.request_id.as_deref(),
            )))
        }
    })
}
