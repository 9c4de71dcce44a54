//! # Broker Ports
//!
//! The narrow slice of an AMQP-style broker the RPC layer needs: queue
//! declaration, publish, consume, ack/reject and close. Adapters implement
//! [`BrokerChannel`]; [`BrokerConnector`] opens fresh channels.

use crate::error::TransportError;
use crate::message::{Delivery, OutboundMessage};
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Options for [`BrokerChannel::consume`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumeOptions {
    /// Deliveries are settled on hand-off and never need an ack.
    pub no_ack: bool,
}

impl ConsumeOptions {
    /// Auto-ack consumption.
    #[must_use]
    pub fn no_ack() -> Self {
        Self { no_ack: true }
    }
}

/// A logical channel on a broker connection.
///
/// Implementations must be safe to share across tasks; callers that need
/// ordered publishes serialize them themselves.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declare a shared queue. Idempotent.
    async fn declare_queue(&self, name: &str) -> Result<(), TransportError>;

    /// Declare a server-named queue owned by this channel. The queue is
    /// deleted when the channel closes.
    async fn declare_exclusive_queue(&self) -> Result<String, TransportError>;

    /// Publish to a queue by name.
    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<(), TransportError>;

    /// Start consuming a queue.
    async fn consume(&self, queue: &str, options: ConsumeOptions)
        -> Result<Consumer, TransportError>;

    /// Stop a consumer. Its stream ends once buffered deliveries are drained.
    async fn cancel(&self, consumer_tag: &str) -> Result<(), TransportError>;

    /// Acknowledge a delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), TransportError>;

    /// Reject a delivery, optionally returning it to its queue.
    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError>;

    /// Close the channel. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;

    /// False once the channel has been closed.
    fn is_open(&self) -> bool;
}

/// Opens channels on a broker connection.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, TransportError>;
}

/// Stream of deliveries for one consumer tag.
///
/// Ends (`None`) when the consumer is cancelled or its channel closes.
#[derive(Debug)]
pub struct Consumer {
    tag: String,
    queue: String,
    receiver: mpsc::UnboundedReceiver<Delivery>,
}

impl Consumer {
    #[must_use]
    pub fn new(
        tag: impl Into<String>,
        queue: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<Delivery>,
    ) -> Self {
        Self {
            tag: tag.into(),
            queue: queue.into(),
            receiver,
        }
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Receive the next delivery.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }
}

impl Stream for Consumer {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageProperties;
    use bytes::Bytes;
    use tokio_stream::StreamExt;

    fn delivery(tag: u64) -> Delivery {
        Delivery {
            delivery_tag: tag,
            queue: "q".into(),
            redelivered: false,
            properties: MessageProperties::default(),
            body: Bytes::from_static(b"{}"),
        }
    }

    #[tokio::test]
    async fn test_consumer_stream_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut consumer = Consumer::new("ctag-1", "q", rx);
        assert_eq!(consumer.tag(), "ctag-1");
        assert_eq!(consumer.queue(), "q");

        tx.send(delivery(1)).unwrap();
        tx.send(delivery(2)).unwrap();
        drop(tx);

        assert_eq!(consumer.next().await.map(|d| d.delivery_tag), Some(1));
        assert_eq!(consumer.recv().await.map(|d| d.delivery_tag), Some(2));
        assert!(consumer.next().await.is_none());
    }
}
