//! # AMQP Adapter
//!
//! [`BrokerConnector`] and [`BrokerChannel`] over a RabbitMQ connection,
//! selected by `amqp://` and `amqps://` URLs.
//!
//! - One connection per connector, opened on the first `open_channel` and
//!   re-opened when the broker drops it.
//! - Shared queues are declared non-durable, the way the services on the
//!   same broker declare them.
//! - Exclusive queues are server-named and auto-deleted.
//! - Publishes go through the default exchange, routed by queue name.
//! - Each consumer is pumped into a [`Consumer`] stream by its own task; the
//!   stream ends when the broker cancels the consumer or the channel closes.

use crate::channel::{BrokerChannel, BrokerConnector, ConsumeOptions, Consumer};
use crate::error::TransportError;
use crate::message::{Delivery, MessageProperties, OutboundMessage};
use async_trait::async_trait;
use bytes::Bytes;
use lapin::options::{
    BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicPublishOptions,
    BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// URL schemes that select this adapter.
pub const AMQP_SCHEMES: [&str; 2] = ["amqp", "amqps"];

/// Reply code sent when closing a channel normally.
const REPLY_SUCCESS: u16 = 200;

fn broker_error(err: lapin::Error) -> TransportError {
    match err {
        lapin::Error::InvalidChannelState(_) | lapin::Error::InvalidConnectionState(_) => {
            TransportError::ChannelClosed
        }
        other => TransportError::Broker(other.to_string()),
    }
}

/// `url` with any credentials masked, for logging.
#[must_use]
pub fn redact_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => match rest.rsplit_once('@') {
            Some((_, host)) => format!("{scheme}://***@{host}"),
            None => url.to_string(),
        },
        None => url.to_string(),
    }
}

/// Connector for a RabbitMQ broker.
pub struct AmqpConnector {
    url: String,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl AmqpConnector {
    /// Connector for `url`. Nothing is dialed until a channel is opened.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>, TransportError> {
        let mut slot = self.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            if connection.status().connected() {
                return Ok(Arc::clone(connection));
            }
            warn!(url = %redact_url(&self.url), "AMQP connection lost, reconnecting");
        }

        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        info!(url = %redact_url(&self.url), "Connected to AMQP broker");

        let connection = Arc::new(connection);
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn open_channel(&self) -> Result<Arc<dyn BrokerChannel>, TransportError> {
        let connection = self.connection().await?;
        let channel = connection.create_channel().await.map_err(broker_error)?;
        debug!(channel_id = channel.id(), "AMQP channel opened");
        Ok(Arc::new(AmqpChannel::new(channel)))
    }
}

/// A channel on an AMQP connection.
pub struct AmqpChannel {
    channel: Channel,
    closed: AtomicBool,
}

impl AmqpChannel {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_queue(&self, name: &str) -> Result<(), TransportError> {
        self.channel
            .queue_declare(name, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(broker_error)?;
        Ok(())
    }

    async fn declare_exclusive_queue(&self) -> Result<String, TransportError> {
        let options = QueueDeclareOptions {
            exclusive: true,
            auto_delete: true,
            ..QueueDeclareOptions::default()
        };
        let queue = self
            .channel
            .queue_declare("", options, FieldTable::default())
            .await
            .map_err(broker_error)?;
        Ok(queue.name().as_str().to_string())
    }

    async fn publish(&self, queue: &str, message: OutboundMessage) -> Result<(), TransportError> {
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &message.body,
                to_amqp_properties(&message.properties),
            )
            .await
            .map_err(broker_error)?;
        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        options: ConsumeOptions,
    ) -> Result<Consumer, TransportError> {
        let tag = format!("ctag-{}", Uuid::new_v4());
        let consume_options = BasicConsumeOptions {
            no_ack: options.no_ack,
            ..BasicConsumeOptions::default()
        };
        let stream = self
            .channel
            .basic_consume(queue, &tag, consume_options, FieldTable::default())
            .await
            .map_err(broker_error)?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let queue_name = queue.to_string();
        let consumer_tag = tag.clone();
        tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(delivery) => {
                        if sender.send(from_amqp_delivery(&queue_name, delivery)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(queue = %queue_name, consumer_tag = %consumer_tag, error = %e, "AMQP consumer failed");
                        break;
                    }
                }
            }
            debug!(queue = %queue_name, consumer_tag = %consumer_tag, "AMQP consumer ended");
        });

        Ok(Consumer::new(tag, queue, receiver))
    }

    async fn cancel(&self, consumer_tag: &str) -> Result<(), TransportError> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(broker_error)
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), TransportError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(broker_error)
    }

    async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), TransportError> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(broker_error)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) || !self.channel.status().connected() {
            return Ok(());
        }
        self.channel
            .close(REPLY_SUCCESS, "OK")
            .await
            .map_err(broker_error)
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.channel.status().connected()
    }
}

fn to_amqp_properties(properties: &MessageProperties) -> BasicProperties {
    let mut amqp = BasicProperties::default();
    if let Some(correlation_id) = &properties.correlation_id {
        amqp = amqp.with_correlation_id(ShortString::from(correlation_id.as_str()));
    }
    if let Some(reply_to) = &properties.reply_to {
        amqp = amqp.with_reply_to(ShortString::from(reply_to.as_str()));
    }
    if let Some(ms) = properties.expiration_ms {
        amqp = amqp.with_expiration(ShortString::from(ms.to_string()));
    }
    if let Some(content_type) = &properties.content_type {
        amqp = amqp.with_content_type(ShortString::from(content_type.as_str()));
    }
    if !properties.headers.is_empty() {
        let mut table = FieldTable::default();
        for (key, value) in &properties.headers {
            table.insert(
                ShortString::from(key.as_str()),
                AMQPValue::LongString(LongString::from(value.as_str())),
            );
        }
        amqp = amqp.with_headers(table);
    }
    amqp
}

fn header_value(value: &AMQPValue) -> Option<String> {
    match value {
        AMQPValue::LongString(s) => Some(String::from_utf8_lossy(s.as_bytes()).into_owned()),
        AMQPValue::ShortString(s) => Some(s.as_str().to_string()),
        _ => None,
    }
}

fn from_amqp_properties(amqp: &BasicProperties) -> MessageProperties {
    let text = |value: &Option<ShortString>| value.as_ref().map(|s| s.as_str().to_string());
    let headers: BTreeMap<String, String> = amqp
        .headers()
        .as_ref()
        .map(|table| {
            table
                .inner()
                .iter()
                .filter_map(|(key, value)| {
                    header_value(value).map(|v| (key.as_str().to_string(), v))
                })
                .collect()
        })
        .unwrap_or_default();

    MessageProperties {
        correlation_id: text(amqp.correlation_id()),
        reply_to: text(amqp.reply_to()),
        expiration_ms: amqp
            .expiration()
            .as_ref()
            .and_then(|s| s.as_str().parse().ok()),
        content_type: text(amqp.content_type()),
        headers,
    }
}

fn from_amqp_delivery(queue: &str, delivery: lapin::message::Delivery) -> Delivery {
    Delivery {
        delivery_tag: delivery.delivery_tag,
        queue: queue.to_string(),
        redelivered: delivery.redelivered,
        properties: from_amqp_properties(&delivery.properties),
        body: Bytes::from(delivery.data),
    }
}
