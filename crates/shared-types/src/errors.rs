//! # Error Types
//!
//! Canonical error-code vocabulary carried in `Response.error.code`, plus the
//! errors raised by the envelope constructors themselves.

use std::fmt;
use thiserror::Error;

/// Canonical error codes placed in the `error.code` field of a [`Response`].
///
/// Structured handler failures may still carry their own free-form codes
/// (`"MISSING_USER"`, ...); these are the codes the RPC layer itself emits.
///
/// [`Response`]: crate::response::Response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unknown or unexpected fault.
    Internal,
    /// Failure raised explicitly by an RPC handler.
    Rpc,
    /// Input validation rejected the payload.
    Validation,
    /// Malformed request.
    BadRequest,
    /// Resource or operation not found.
    NotFound,
    /// Conflicting state.
    Conflict,
    /// Caller is authenticated but not allowed.
    Forbidden,
    /// Caller is not authenticated.
    Unauthorized,
}

impl ErrorCode {
    /// All canonical codes, in declaration order.
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::Internal,
        ErrorCode::Rpc,
        ErrorCode::Validation,
        ErrorCode::BadRequest,
        ErrorCode::NotFound,
        ErrorCode::Conflict,
        ErrorCode::Forbidden,
        ErrorCode::Unauthorized,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Internal => "INTERNAL_ERROR",
            ErrorCode::Rpc => "RPC_ERROR",
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
        }
    }

    /// Parse a wire code back into a canonical code.
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.as_str().to_string()
    }
}

impl PartialEq<ErrorCode> for String {
    fn eq(&self, other: &ErrorCode) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<ErrorCode> for &str {
    fn eq(&self, other: &ErrorCode) -> bool {
        *self == other.as_str()
    }
}

/// Errors raised while constructing an envelope.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// A constructor argument is outside its valid range.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
