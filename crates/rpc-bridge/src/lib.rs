// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! RPC Bridge - request/reply RPC over a message broker.
//!
//! Outbound, application code calls other services through [`RpcCaller`];
//! inbound, the [`Dispatcher`] consumes a service queue and turns every
//! handler outcome into exactly one reply.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │                            RPC BRIDGE                              │
//! ├────────────────────────────────────────────────────────────────────┤
//! │  OUTBOUND                           INBOUND                        │
//! │                                                                    │
//! │  RpcCaller                          Dispatcher (service queue)     │
//! │   ├─ RpcClient (shared channel)      │                             │
//! │   │    ├─ CorrelationRegistry        ▼                             │
//! │   │    └─ ReplyConsumer ◄─┐         DispatchInterceptor            │
//! │   └─ AdHocRpcClient       │          │ decode, invoke, normalize   │
//! │        (channel per call) │          ▼                             │
//! │                           │         LoggingInterceptor             │
//! │                           │          ▼                             │
//! │                           │         OperationRouter → handlers     │
//! └───────────┬───────────────┼──────────────────────┬─────────────────┘
//!             │ request       │ reply                │ reply
//!             ▼               │                      ▼
//!        target queue ─────── broker ─────────── reply_to queue
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use rpc_bridge::{RpcClient, RpcClientConfig, RpcRequest};
//!
//! let client = RpcClient::start(channel, RpcClientConfig::default()).await?;
//! let reply = client
//!     .call(RpcRequest::new("members_v2", "getMemberById", payload))
//!     .await?;
//! ```
//!
//! A reply, error envelopes included, is returned as `Ok`. `Err` means no
//! reply was obtained: timeout, transport failure or shutdown.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod ipc;
pub mod middleware;
pub mod ports;
pub mod router;
pub mod service;

// Re-exports for public API
pub use domain::config::{BackoffConfig, RpcClientConfig, DEFAULT_RPC_TIMEOUT};
pub use domain::context::{RequestContext, ScopeInfo, UserContext};
pub use domain::correlation::CorrelationToken;
pub use domain::error::{DispatchError, RegistryError, RpcError};
pub use domain::pending::{CorrelationRegistry, PendingCall, RegistryStats};
pub use ipc::codec::DECODE_ERROR;
pub use ipc::{AdHocRpcClient, ReplyConsumer, RpcClient};
pub use middleware::{DispatchInterceptor, LoggingInterceptor};
pub use ports::{HandlerDispatch, HandlerOutput, HandlerResult, RpcCaller, RpcRequest};
pub use router::{handler_fn, OperationHandler, OperationRouter};
pub use service::{Dispatcher, DispatcherConfig, DispatchStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
