//! Ports of the RPC bridge.
//!
//! - [`inbound::HandlerDispatch`]: the application side, invoked for every
//!   inbound request.
//! - [`outbound::RpcCaller`]: what application code uses to call other
//!   services.

pub mod inbound;
pub mod outbound;

pub use inbound::{HandlerDispatch, HandlerOutput, HandlerResult};
pub use outbound::{RpcCaller, RpcRequest};
