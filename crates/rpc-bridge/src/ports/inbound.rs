//! Inbound port: handler dispatch.

use crate::domain::context::RequestContext;
use async_trait::async_trait;
use serde_json::Value;
use shared_types::envelope::success;
use shared_types::{HandlerFailure, Response};
use std::sync::Arc;

/// What a handler returns on success.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// A complete envelope, sent as is.
    Envelope(Response),
    /// Bare data, wrapped with `success` before sending.
    Data(Value),
}

impl HandlerOutput {
    /// The reply envelope for this output.
    #[must_use]
    pub fn into_response(self, request_id: Option<&str>) -> Response {
        match self {
            HandlerOutput::Envelope(response) => response,
            HandlerOutput::Data(data) => success(data, None, request_id),
        }
    }
}

impl From<Response> for HandlerOutput {
    fn from(response: Response) -> Self {
        HandlerOutput::Envelope(response)
    }
}

impl From<Value> for HandlerOutput {
    fn from(data: Value) -> Self {
        HandlerOutput::Data(data)
    }
}

pub type HandlerResult = Result<HandlerOutput, HandlerFailure>;

/// Executes the operation named in the context.
#[async_trait]
pub trait HandlerDispatch: Send + Sync {
    async fn invoke(&self, ctx: &RequestContext, payload: Value) -> HandlerResult;
}

#[async_trait]
impl<T: HandlerDispatch + ?Sized> HandlerDispatch for Arc<T> {
    async fn invoke(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        (**self).invoke(ctx, payload).await
    }
}
