//! Reply Consumer - routes replies on the client's reply queue to the
//! correlation registry.
//!
//! One exclusive, server-named queue per client, consumed for the client's
//! lifetime. If the consumer stream ends while the client is running, the
//! worker re-establishes consumption with exponential backoff, declaring a
//! fresh reply queue when the old one is gone. Calls published to a lost
//! queue time out.

use crate::domain::config::BackoffConfig;
use crate::domain::correlation::CorrelationToken;
use crate::domain::pending::CorrelationRegistry;
use crate::ipc::codec;
use parking_lot::{Mutex, RwLock};
use shared_bus::{BrokerChannel, ConsumeOptions, Consumer, Delivery, TransportError};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Where replies are currently consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ReplyRoute {
    queue: String,
    consumer_tag: String,
}

/// Handle to the running reply consumer task.
pub struct ReplyConsumer {
    route: Arc<RwLock<ReplyRoute>>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReplyConsumer {
    /// Declare the reply queue, start consuming it and spawn the worker.
    ///
    /// # Errors
    ///
    /// Propagates the transport error if the queue cannot be declared or
    /// consumed.
    pub async fn start(
        channel: Arc<dyn BrokerChannel>,
        registry: CorrelationRegistry,
        backoff: BackoffConfig,
    ) -> Result<Self, TransportError> {
        let queue = channel.declare_exclusive_queue().await?;
        let consumer = channel.consume(&queue, ConsumeOptions::no_ack()).await?;

        info!(queue = %queue, "Reply consumer started");

        let route = Arc::new(RwLock::new(ReplyRoute {
            queue,
            consumer_tag: consumer.tag().to_string(),
        }));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = ReplyWorker {
            channel,
            registry,
            backoff,
            route: Arc::clone(&route),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run(consumer));

        Ok(Self {
            route,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    /// Current reply queue name.
    #[must_use]
    pub fn queue(&self) -> String {
        self.route.read().queue.clone()
    }

    /// Current consumer tag.
    #[must_use]
    pub fn consumer_tag(&self) -> String {
        self.route.read().consumer_tag.clone()
    }

    /// Stop the worker and cancel its consumer. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Reply consumer task failed");
            }
        }
    }
}

impl Drop for ReplyConsumer {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct ReplyWorker {
    channel: Arc<dyn BrokerChannel>,
    registry: CorrelationRegistry,
    backoff: BackoffConfig,
    route: Arc<RwLock<ReplyRoute>>,
    shutdown: watch::Receiver<bool>,
}

impl ReplyWorker {
    async fn run(mut self, mut consumer: Consumer) {
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                delivery = consumer.recv() => match delivery {
                    Some(delivery) => self.route_reply(delivery),
                    None => {
                        error!(
                            queue = %consumer.queue(),
                            "Reply consumer stream ended unexpectedly"
                        );
                        match self.reconnect().await {
                            Some(next) => consumer = next,
                            None => return,
                        }
                    }
                },
            }
        }

        // Cancel before the owner closes the channel.
        if let Err(e) = self.channel.cancel(consumer.tag()).await {
            debug!(error = %e, "Reply consumer cancel failed");
        }
        info!(queue = %consumer.queue(), "Reply consumer stopped");
    }

    fn route_reply(&self, delivery: Delivery) {
        let Some(token) = delivery
            .properties
            .correlation_id
            .as_deref()
            .filter(|t| !t.is_empty())
        else {
            warn!(queue = %delivery.queue, "Reply without correlation token dropped");
            return;
        };

        let token = CorrelationToken::from(token);
        let response = codec::decode_reply(&delivery.body);
        self.registry.resolve(&token, response);
    }

    /// Re-establish consumption. Returns `None` on shutdown or when the
    /// channel is closed for good.
    async fn reconnect(&mut self) -> Option<Consumer> {
        let mut attempt: u32 = 0;
        loop {
            let delay = self.backoff.delay(attempt);
            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.channel.is_open() {
                error!("Reply channel closed, reply consumer stopping");
                return None;
            }

            let queue = self.route.read().queue.clone();
            match self.channel.consume(&queue, ConsumeOptions::no_ack()).await {
                Ok(consumer) => {
                    self.route.write().consumer_tag = consumer.tag().to_string();
                    info!(queue = %queue, attempt, "Reply consumer re-established");
                    return Some(consumer);
                }
                Err(TransportError::QueueNotFound(_)) => {
                    match self.channel.declare_exclusive_queue().await {
                        Ok(fresh) => {
                            warn!(old = %queue, new = %fresh, "Reply queue lost, declared a new one");
                            self.route.write().queue = fresh;
                        }
                        Err(e) => error!(error = %e, attempt, "Failed to re-declare reply queue"),
                    }
                }
                Err(e) => error!(error = %e, attempt, "Failed to re-establish reply consumer"),
            }

            attempt = attempt.saturating_add(1);
        }
    }
}
