//! Dispatcher - consumes a service queue and runs every delivery through
//! the [`DispatchInterceptor`].
//!
//! Deliveries are processed concurrently up to `max_in_flight`. A delivery
//! whose handler failed is rejected without requeue once its error reply
//! has been sent. If the consumer stream ends while the dispatcher is
//! running, the worker re-declares the queue and consumes it again with
//! exponential backoff. Shutdown stops consuming and waits for in-flight
//! deliveries to finish.

use crate::domain::config::BackoffConfig;
use crate::domain::error::DispatchError;
use crate::middleware::DispatchInterceptor;
use crate::ports::inbound::HandlerDispatch;
use parking_lot::{Mutex, RwLock};
use shared_bus::{BrokerChannel, ConsumeOptions, Consumer, Delivery, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Default cap on concurrently processed deliveries.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Queue to consume requests from.
    pub queue: String,
    pub max_in_flight: usize,
    /// Delay between attempts to consume the queue again.
    pub backoff: BackoffConfig,
}

impl DispatcherConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            backoff: BackoffConfig::default(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

/// Delivery counters.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub received: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
}

/// Handle to a running dispatcher.
pub struct Dispatcher {
    queue: String,
    consumer_tag: Arc<RwLock<String>>,
    stats: Arc<DispatchStats>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Declare the service queue, start consuming it and spawn the
    /// dispatch loop.
    ///
    /// # Errors
    ///
    /// Propagates the transport error if the queue cannot be declared or
    /// consumed.
    pub async fn start(
        channel: Arc<dyn BrokerChannel>,
        handler: Arc<dyn HandlerDispatch>,
        config: DispatcherConfig,
    ) -> Result<Self, TransportError> {
        channel.declare_queue(&config.queue).await?;
        let consumer = channel
            .consume(&config.queue, ConsumeOptions::default())
            .await?;
        let consumer_tag = Arc::new(RwLock::new(consumer.tag().to_string()));

        info!(
            queue = %config.queue,
            max_in_flight = config.max_in_flight,
            "Dispatcher started"
        );

        let stats = Arc::new(DispatchStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let max_in_flight = config.max_in_flight.max(1);

        let worker = DispatchWorker {
            interceptor: Arc::new(DispatchInterceptor::new(Arc::clone(&channel), handler)),
            channel,
            queue: config.queue.clone(),
            backoff: config.backoff,
            consumer_tag: Arc::clone(&consumer_tag),
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            stats: Arc::clone(&stats),
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run(consumer));

        Ok(Self {
            queue: config.queue,
            consumer_tag,
            stats,
            shutdown_tx,
            task: Mutex::new(Some(task)),
        })
    }

    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Current consumer tag.
    #[must_use]
    pub fn consumer_tag(&self) -> String {
        self.consumer_tag.read().clone()
    }

    #[must_use]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Stop consuming and wait for in-flight deliveries. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "Dispatcher task failed");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct DispatchWorker {
    channel: Arc<dyn BrokerChannel>,
    queue: String,
    backoff: BackoffConfig,
    consumer_tag: Arc<RwLock<String>>,
    interceptor: Arc<DispatchInterceptor>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    stats: Arc<DispatchStats>,
    shutdown: watch::Receiver<bool>,
}

impl DispatchWorker {
    async fn run(mut self, mut consumer: Consumer) {
        loop {
            let permit = tokio::select! {
                _ = self.shutdown.changed() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let delivery = tokio::select! {
                _ = self.shutdown.changed() => break,
                delivery = consumer.recv() => delivery,
            };
            let Some(delivery) = delivery else {
                drop(permit);
                error!(queue = %self.queue, "Dispatcher consumer stream ended unexpectedly");
                match self.reconsume().await {
                    Some(next) => {
                        consumer = next;
                        continue;
                    }
                    None => break,
                }
            };

            self.stats.received.fetch_add(1, Ordering::Relaxed);
            let interceptor = Arc::clone(&self.interceptor);
            let channel = Arc::clone(&self.channel);
            let stats = Arc::clone(&self.stats);
            tokio::spawn(async move {
                let _permit = permit;
                process(&interceptor, channel.as_ref(), &stats, delivery).await;
            });
        }

        if let Err(e) = self.channel.cancel(consumer.tag()).await {
            debug!(error = %e, "Dispatcher consumer cancel failed");
        }

        // Drain: every permit back means every delivery task has finished.
        let drained = u32::try_from(self.max_in_flight).unwrap_or(u32::MAX);
        if self.permits.acquire_many(drained).await.is_err() {
            warn!("Dispatcher permits closed before drain");
        }
        info!(queue = %self.queue, "Dispatcher stopped");
    }

    /// Consume the service queue again. Returns `None` on shutdown or when
    /// the channel is closed for good.
    async fn reconsume(&mut self) -> Option<Consumer> {
        let mut attempt: u32 = 0;
        loop {
            let delay = self.backoff.delay(attempt);
            tokio::select! {
                _ = self.shutdown.changed() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            if !self.channel.is_open() {
                error!(queue = %self.queue, "Dispatch channel closed, dispatcher stopping");
                return None;
            }

            let consumed = match self.channel.declare_queue(&self.queue).await {
                Ok(()) => {
                    self.channel
                        .consume(&self.queue, ConsumeOptions::default())
                        .await
                }
                Err(e) => Err(e),
            };
            match consumed {
                Ok(consumer) => {
                    *self.consumer_tag.write() = consumer.tag().to_string();
                    info!(queue = %self.queue, attempt, "Dispatcher consumer re-established");
                    return Some(consumer);
                }
                Err(e) => error!(
                    queue = %self.queue,
                    error = %e,
                    attempt,
                    "Failed to re-establish dispatcher consumer"
                ),
            }

            attempt = attempt.saturating_add(1);
        }
    }
}

async fn process(
    interceptor: &DispatchInterceptor,
    channel: &dyn BrokerChannel,
    stats: &DispatchStats,
    delivery: Delivery,
) {
    match interceptor.handle_delivery(&delivery).await {
        Ok(()) => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Err(DispatchError::Handler(failure)) => {
            warn!(
                queue = %delivery.queue,
                delivery_tag = delivery.delivery_tag,
                error = %failure,
                "Handler failed, delivery rejected"
            );
        }
        Err(e) => {
            error!(
                queue = %delivery.queue,
                delivery_tag = delivery.delivery_tag,
                error = %e,
                "Dispatch failed, delivery rejected"
            );
        }
    }

    stats.failed.fetch_add(1, Ordering::Relaxed);
    if let Err(e) = channel.reject(delivery.delivery_tag, false).await {
        error!(delivery_tag = delivery.delivery_tag, error = %e, "Failed to reject delivery");
    }
}
