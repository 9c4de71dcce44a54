//! # Shared Types Crate
//!
//! The response envelope shared by every node that talks over the broker,
//! together with the pure logic that builds it.
//!
//! ## Design Principles
//!
//! - **Single Shape**: every reply (success or failure) travels as a
//!   [`Response`], so callers decode exactly one structure.
//! - **Pure Construction**: the [`envelope`] constructors and the
//!   [`normalize()`] mapping perform no I/O and hold no state.
//! - **No Leaks**: handler faults are reduced to a code, a message and
//!   optional structured details before they leave the node.

pub mod envelope;
pub mod errors;
pub mod normalize;
pub mod response;

pub use errors::{EnvelopeError, ErrorCode};
pub use normalize::{normalize, HandlerFailure};
pub use response::{ErrorBody, PaginationMeta, Response, ResponseMeta, ResponseStatus};
