//! # Adapters
//!
//! Wrappers that attach node concerns (metrics) to the RPC ports.

pub mod metrics;

pub use metrics::{call_outcome, InstrumentedCaller, InstrumentedDispatch};
