//! Operation router.
//!
//! Maps the operation name carried by each request to its handler. Unknown
//! operations fail with `NOT_FOUND`, which the interceptor turns into an
//! error reply like any other handler failure.

use crate::domain::context::RequestContext;
use crate::domain::error::DispatchError;
use crate::ports::inbound::{HandlerDispatch, HandlerResult};
use async_trait::async_trait;
use serde_json::Value;
use shared_types::{ErrorCode, HandlerFailure};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// Handler for a single operation.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    async fn handle(&self, ctx: &RequestContext, payload: Value) -> HandlerResult;
}

/// [`OperationHandler`] backed by an async closure.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> OperationHandler for FnHandler<F>
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn handle(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        (self.0)(ctx.clone(), payload).await
    }
}

/// Wrap an async closure as an [`OperationHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn OperationHandler>
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Operation name → handler table.
#[derive(Default)]
pub struct OperationRouter {
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
}

impl OperationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an operation.
    ///
    /// # Errors
    ///
    /// [`DispatchError::DuplicateOperation`] if the operation already has one.
    pub fn register(
        &mut self,
        operation: impl Into<String>,
        handler: Arc<dyn OperationHandler>,
    ) -> Result<(), DispatchError> {
        let operation = operation.into();
        if self.handlers.contains_key(&operation) {
            return Err(DispatchError::DuplicateOperation(operation));
        }
        self.handlers.insert(operation, handler);
        Ok(())
    }

    pub fn get(&self, operation: &str) -> Option<&Arc<dyn OperationHandler>> {
        self.handlers.get(operation)
    }

    /// Registered operation names, sorted.
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl HandlerDispatch for OperationRouter {
    async fn invoke(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        match self.handlers.get(&ctx.operation) {
            Some(handler) => handler.handle(ctx, payload).await,
            None => Err(HandlerFailure::coded(
                ErrorCode::NotFound,
                format!("Unknown operation: {}", ctx.operation),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::inbound::HandlerOutput;
    use serde_json::json;
    use shared_types::normalize;
    use tokio_test::{assert_err, assert_ok};

    fn echo() -> Arc<dyn OperationHandler> {
        handler_fn(|_ctx, payload| async move { Ok(HandlerOutput::Data(payload)) })
    }

    #[tokio::test]
    async fn test_routes_by_operation() {
        let mut router = OperationRouter::new();
        router.register("echo", echo()).unwrap();
        router
            .register(
                "whoami",
                handler_fn(|ctx: RequestContext, _| async move {
                    Ok(HandlerOutput::Data(json!(ctx.operation)))
                }),
            )
            .unwrap();

        let output = router
            .invoke(&RequestContext::for_operation("echo"), json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(output, HandlerOutput::Data(json!({"a": 1})));

        let output = router
            .invoke(&RequestContext::for_operation("whoami"), json!(null))
            .await
            .unwrap();
        assert_eq!(output, HandlerOutput::Data(json!("whoami")));
        assert_eq!(router.operations(), vec!["echo", "whoami"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut router = OperationRouter::new();
        assert_ok!(router.register("echo", echo()));
        let err = assert_err!(router.register("echo", echo()));
        assert_eq!(err, DispatchError::DuplicateOperation("echo".into()));
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_found() {
        let router = OperationRouter::new();
        let failure = router
            .invoke(&RequestContext::for_operation("nope"), json!({}))
            .await
            .unwrap_err();

        let response = normalize(&failure, None);
        let err = response.error.unwrap();
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.message, "Unknown operation: nope");
    }
}
