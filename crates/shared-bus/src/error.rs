//! Transport-level errors.

use thiserror::Error;

/// Errors raised by a broker channel or connector.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The channel was closed, locally or by the broker.
    #[error("Channel closed")]
    ChannelClosed,

    /// Consuming from a queue that was never declared.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// The queue is exclusive to another channel.
    #[error("Queue {0} is locked by another channel")]
    ExclusiveLocked(String),

    /// Ack/reject of a delivery this channel does not hold.
    #[error("Unknown delivery tag: {0}")]
    UnknownDeliveryTag(u64),

    /// Cancel of a consumer this channel does not own.
    #[error("Unknown consumer tag: {0}")]
    UnknownConsumer(String),

    /// Broker URL with a scheme no adapter handles.
    #[error("Unsupported broker URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Connection could not be established.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The broker refused or failed an operation.
    #[error("Broker error: {0}")]
    Broker(String),
}
