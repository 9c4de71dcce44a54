//! Inbound middleware: the dispatch interceptor and the logging decorator.
//!
//! Order per delivery: Dispatcher → DispatchInterceptor → LoggingInterceptor
//! → handler.

pub mod interceptor;
pub mod logging;

pub use interceptor::DispatchInterceptor;
pub use logging::{payload_preview, LoggingInterceptor, PAYLOAD_MAX_CHARS, SLOW_THRESHOLD};
