//! Domain types for the RPC bridge.
//!
//! Correlation tokens, the pending-call registry, request context and the
//! error and configuration types shared by the client and dispatch sides.

pub mod config;
pub mod context;
pub mod correlation;
pub mod error;
pub mod pending;

// Re-exports for convenience
pub use config::{BackoffConfig, RpcClientConfig, DEFAULT_RPC_TIMEOUT};
pub use context::{RequestContext, ScopeInfo, UserContext};
pub use correlation::CorrelationToken;
pub use error::{DispatchError, RegistryError, RpcError};
pub use pending::{CallOutcome, CorrelationRegistry, PendingCall, RegistryStats};
