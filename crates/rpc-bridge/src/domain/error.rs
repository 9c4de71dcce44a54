//! Error types for the RPC bridge.

use crate::domain::correlation::CorrelationToken;
use shared_bus::TransportError;
use shared_types::HandlerFailure;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the correlation registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A call with this token is still pending.
    #[error("Correlation token already pending: {0}")]
    DuplicateToken(CorrelationToken),
}

/// Failure of an outbound call. A reply, even an error reply, is never an
/// `RpcError`; this covers only calls that got no reply.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    /// No reply arrived before the deadline.
    #[error("RPC timed out after {}ms (correlation_id {token})", .timeout.as_millis())]
    Timeout {
        token: CorrelationToken,
        timeout: Duration,
    },

    /// The request could not be published, or the reply path failed.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The payload could not be encoded as JSON.
    #[error("Failed to encode request: {0}")]
    Encode(String),

    /// The pending entry was removed without a reply (shutdown).
    #[error("RPC call cancelled")]
    Cancelled,

    /// The client was shut down before the call was made.
    #[error("RPC client is shut down")]
    Shutdown,
}

impl RpcError {
    /// True for [`RpcError::Timeout`].
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }
}

/// Errors on the inbound dispatch path.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// The handler failed. The normalized reply has already been sent.
    #[error("Handler failed: {0}")]
    Handler(HandlerFailure),

    /// Broker operation (reply publish, ack, reject) failed.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The reply envelope could not be encoded.
    #[error("Failed to encode reply: {0}")]
    Encode(String),

    /// Two handlers registered for one operation.
    #[error("Duplicate handler for operation: {0}")]
    DuplicateOperation(String),
}

impl From<HandlerFailure> for DispatchError {
    fn from(failure: HandlerFailure) -> Self {
        DispatchError::Handler(failure)
    }
}
