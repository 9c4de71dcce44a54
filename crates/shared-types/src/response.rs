//! # Response Envelope
//!
//! The uniform result shape returned by every operation, independent of the
//! transport that carries it. Serialized as camelCase JSON:
//!
//! ```json
//! {
//!   "status": "success",
//!   "data": { "name": "Ann" },
//!   "meta": { "timestamp": "2024-01-01T12:00:00.000Z", "requestId": "..." }
//! }
//! ```
//!
//! Construct values through [`crate::envelope`]; the constructors there keep
//! the `status`/`data`/`error` invariant intact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome class of a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
    Warning,
    Info,
}

/// Error section of an error [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Pagination metadata attached by `paginated_success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

/// Envelope metadata. `timestamp` is stamped when the response is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
}

/// Uniform response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response<T = Value> {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub meta: ResponseMeta,
}

impl<T> Response<T> {
    /// True when `status == error`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == ResponseStatus::Error
    }

    /// Error code, if this is an error response.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }

    /// Check the envelope invariant:
    ///
    /// - `status = error` ⟺ `error` is set with non-empty `code` and `message`
    /// - an error response never carries `data`
    /// - `meta.timestamp` is set
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        if self.meta.timestamp.is_empty() {
            return false;
        }
        match (&self.status, &self.error) {
            (ResponseStatus::Error, Some(err)) => {
                !err.code.is_empty() && !err.message.is_empty() && self.data.is_none()
            }
            (ResponseStatus::Error, None) => false,
            (_, Some(_)) => false,
            (_, None) => true,
        }
    }

    /// Convert the data payload, keeping status, message, error and meta.
    pub fn map_data<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            status: self.status,
            data: self.data.map(f),
            message: self.message,
            error: self.error,
            meta: self.meta,
        }
    }
}

impl<T: Serialize> Response<T> {
    /// Erase the data type into a JSON value.
    pub fn into_json(self) -> Result<Response<Value>, serde_json::Error> {
        let data = self.data.map(serde_json::to_value).transpose()?;
        Ok(Response {
            status: self.status,
            data,
            message: self.message,
            error: self.error,
            meta: self.meta,
        })
    }
}
