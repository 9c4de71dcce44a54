//! # Node Container
//!
//! Configuration shared by the wiring and the handlers.

pub mod config;

pub use config::{ConfigError, NodeConfig, DEFAULT_MEMBERS_QUEUE, DEFAULT_SERVICE_QUEUE};
