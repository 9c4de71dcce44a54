//! Broker-facing side of outbound calls.
//!
//! Requests go out on the target service's work queue; replies come back on
//! a reply queue owned by the caller and are matched by correlation token.

pub mod adhoc;
pub mod client;
pub mod codec;
pub mod reply_consumer;

pub use adhoc::AdHocRpcClient;
pub use client::RpcClient;
pub use reply_consumer::ReplyConsumer;
