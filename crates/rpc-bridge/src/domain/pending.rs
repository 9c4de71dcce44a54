//! Correlation Registry - in-flight calls awaiting a reply.
//!
//! Maps correlation tokens to waiting callers. Each entry moves from
//! **Pending** to exactly one terminal state:
//!
//! - **Resolved**: a reply arrived (`resolve`)
//! - **TimedOut**: the entry's timer fired first
//! - **Cancelled**: the waiter was dropped, or `cancel`/`cancel_all` ran
//!
//! The terminal transition is the removal of the entry from the map, so
//! whichever path removes it first wins and every other path becomes a
//! no-op. The result is sent to the waiter only after the removal, outside
//! the map's shard lock.
//!
//! Flow:
//! 1. Client generates a [`CorrelationToken`]
//! 2. Client calls `register()` and gets a [`PendingCall`]
//! 3. Client publishes the request carrying the token
//! 4. Reply consumer receives the reply and calls `resolve()`
//! 5. Client awaits [`PendingCall::wait`]

use crate::domain::correlation::CorrelationToken;
use crate::domain::error::{RegistryError, RpcError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::Response;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// What a waiter eventually receives.
pub type CallOutcome = Result<Response, RpcError>;

struct PendingEntry {
    /// Distinguishes this registration from a later one reusing the token.
    call_id: u64,
    sender: oneshot::Sender<CallOutcome>,
    created_at: Instant,
    timeout: Duration,
    timer: JoinHandle<()>,
}

/// Registry statistics.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub total_registered: AtomicU64,
    pub total_completed: AtomicU64,
    pub total_timeouts: AtomicU64,
    pub total_cancelled: AtomicU64,
    /// Replies for tokens that were not pending.
    pub total_late_replies: AtomicU64,
}

struct RegistryInner {
    pending: DashMap<CorrelationToken, PendingEntry>,
    next_call_id: AtomicU64,
    stats: RegistryStats,
}

impl RegistryInner {
    fn expire(&self, token: &CorrelationToken, call_id: u64) {
        let Some((token, entry)) = self.pending.remove_if(token, |_, e| e.call_id == call_id)
        else {
            return;
        };

        self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
        warn!(
            correlation_id = %token,
            elapsed_ms = entry.created_at.elapsed().as_millis(),
            timeout_ms = entry.timeout.as_millis(),
            "RPC call timed out"
        );

        let timeout = entry.timeout;
        let _ = entry.sender.send(Err(RpcError::Timeout { token, timeout }));
    }

    fn remove_without_reply(&self, token: &CorrelationToken, call_id: Option<u64>) -> bool {
        let removed = match call_id {
            Some(id) => self.pending.remove_if(token, |_, e| e.call_id == id),
            None => self.pending.remove(token),
        };
        match removed {
            Some((token, entry)) => {
                entry.timer.abort();
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %token, "Pending call cancelled");
                true
            }
            None => false,
        }
    }
}

/// Registry of pending calls. Cheap to clone; clones share state.
///
/// `register` must be called from within a Tokio runtime (it arms a timer
/// task).
#[derive(Clone)]
pub struct CorrelationRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for CorrelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                pending: DashMap::new(),
                next_call_id: AtomicU64::new(0),
                stats: RegistryStats::default(),
            }),
        }
    }

    /// Register a pending call and arm its timeout.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateToken`] if `token` is already pending.
    pub fn register(
        &self,
        token: CorrelationToken,
        timeout: Duration,
    ) -> Result<PendingCall, RegistryError> {
        let call_id = self.inner.next_call_id.fetch_add(1, Ordering::Relaxed);

        let slot = match self.inner.pending.entry(token.clone()) {
            Entry::Occupied(_) => {
                error!(correlation_id = %token, "Duplicate correlation token");
                return Err(RegistryError::DuplicateToken(token));
            }
            Entry::Vacant(slot) => slot,
        };

        let (sender, receiver) = oneshot::channel();
        let weak = Arc::downgrade(&self.inner);
        let timer_token = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = weak.upgrade() {
                inner.expire(&timer_token, call_id);
            }
        });

        slot.insert(PendingEntry {
            call_id,
            sender,
            created_at: Instant::now(),
            timeout,
            timer,
        });
        self.inner
            .stats
            .total_registered
            .fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %token,
            timeout_ms = timeout.as_millis(),
            "Registered pending call"
        );

        Ok(PendingCall {
            token,
            call_id,
            receiver,
            registry: Arc::downgrade(&self.inner),
            settled: false,
        })
    }

    /// Deliver a reply to the waiter of `token`.
    ///
    /// Returns true if the reply was handed to a waiting caller. Replies for
    /// unknown, timed-out or already-resolved tokens are logged and dropped.
    pub fn resolve(&self, token: &CorrelationToken, response: Response) -> bool {
        let Some((token, entry)) = self.inner.pending.remove(token) else {
            self.inner
                .stats
                .total_late_replies
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                correlation_id = %token,
                "Reply for unknown or expired correlation token"
            );
            return false;
        };

        entry.timer.abort();
        let elapsed = entry.created_at.elapsed();

        match entry.sender.send(Ok(response)) {
            Ok(()) => {
                self.inner
                    .stats
                    .total_completed
                    .fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %token,
                    response_time_ms = elapsed.as_millis(),
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // Waiter dropped between removal and send.
                self.inner
                    .stats
                    .total_cancelled
                    .fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %token, "Pending call receiver dropped");
                false
            }
        }
    }

    /// Remove a pending call without replying. The waiter sees
    /// [`RpcError::Cancelled`].
    pub fn cancel(&self, token: &CorrelationToken) -> bool {
        self.inner.remove_without_reply(token, None)
    }

    /// Cancel every pending call. Returns how many were removed.
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<CorrelationToken> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let cancelled = tokens.iter().filter(|token| self.cancel(token)).count();
        if cancelled > 0 {
            debug!(count = cancelled, "Cancelled all pending calls");
        }
        cancelled
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    #[must_use]
    pub fn is_pending(&self, token: &CorrelationToken) -> bool {
        self.inner.pending.contains_key(token)
    }

    #[must_use]
    pub fn stats(&self) -> &RegistryStats {
        &self.inner.stats
    }
}

/// Handle to one registered call.
///
/// Dropping it before the call settles deregisters the entry, so an
/// abandoned call never leaks and its late reply is dropped.
#[must_use = "a pending call is cancelled when dropped"]
pub struct PendingCall {
    token: CorrelationToken,
    call_id: u64,
    receiver: oneshot::Receiver<CallOutcome>,
    registry: Weak<RegistryInner>,
    settled: bool,
}

impl PendingCall {
    #[must_use]
    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }

    /// Wait for the reply, the timeout, or cancellation.
    pub async fn wait(mut self) -> CallOutcome {
        let outcome = (&mut self.receiver).await;
        self.settled = true;
        outcome.unwrap_or(Err(RpcError::Cancelled))
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(inner) = self.registry.upgrade() {
            inner.remove_without_reply(&self.token, Some(self.call_id));
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("token", &self.token)
            .field("settled", &self.settled)
            .finish()
    }
}
