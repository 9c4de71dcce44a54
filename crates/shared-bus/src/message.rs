//! # Broker Messages
//!
//! Wire-level message types: the properties a broker carries alongside an
//! opaque body, the message handed to `publish`, and the delivery handed to
//! a consumer.

use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Header naming the operation an inbound request targets.
pub const OPERATION_HEADER: &str = "operation";

/// Content type stamped on JSON bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-message broker properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    /// Token pairing a reply with its request.
    pub correlation_id: Option<String>,
    /// Queue the reply should be sent to.
    pub reply_to: Option<String>,
    /// Advisory time-to-live, in milliseconds.
    pub expiration_ms: Option<u64>,
    pub content_type: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl MessageProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    #[must_use]
    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the advisory expiration. Sub-millisecond remainders are dropped.
    #[must_use]
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.expiration_ms = Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));
        self
    }

    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Look up a header value.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// The [`OPERATION_HEADER`] value, if present.
    #[must_use]
    pub fn operation(&self) -> Option<&str> {
        self.header(OPERATION_HEADER)
    }

    /// Advisory expiration as a [`Duration`].
    #[must_use]
    pub fn expiration(&self) -> Option<Duration> {
        self.expiration_ms.map(Duration::from_millis)
    }
}

/// A message handed to [`BrokerChannel::publish`](crate::BrokerChannel::publish).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub properties: MessageProperties,
    pub body: Bytes,
}

impl OutboundMessage {
    /// Message with an opaque body and empty properties.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            properties: MessageProperties::default(),
            body: body.into(),
        }
    }

    /// Serialize `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `value` cannot be encoded.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut message = Self::new(body);
        message.properties.content_type = Some(JSON_CONTENT_TYPE.to_string());
        Ok(message)
    }

    /// Replace the properties, keeping any content type already set.
    #[must_use]
    pub fn with_properties(mut self, properties: MessageProperties) -> Self {
        let content_type = self.properties.content_type.take();
        self.properties = properties;
        if self.properties.content_type.is_none() {
            self.properties.content_type = content_type;
        }
        self
    }
}

/// A message delivered to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Channel-scoped tag used to ack or reject this delivery.
    pub delivery_tag: u64,
    /// Queue the message was consumed from.
    pub queue: String,
    /// True when the message was requeued after a reject or channel close.
    pub redelivered: bool,
    pub properties: MessageProperties,
    pub body: Bytes,
}
