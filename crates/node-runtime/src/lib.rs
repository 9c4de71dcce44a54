//! # Node Runtime Library
//!
//! This library exposes the internal modules of the node runtime for testing.
//! The main entry point is the `main.rs` binary.
//!
//! - `container/` - configuration
//! - `handlers/` - the operations this node serves
//! - `adapters/` - metric wrappers around the RPC ports
//! - `wiring/` - startup and shutdown of the client and dispatcher

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod wiring;

pub use container::{ConfigError, NodeConfig};
pub use wiring::NodeRuntime;
