//! # Envelope Builder
//!
//! Pure constructors for [`Response`], one per status. Every constructor
//! stamps `meta.timestamp` with the current instant (ISO-8601, UTC,
//! millisecond precision) so the timestamp reflects construction time, not
//! call time.
//!
//! No I/O, no shared state: safe to call from any task or thread.

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::errors::{EnvelopeError, ErrorCode};
use crate::response::{ErrorBody, PaginationMeta, Response, ResponseMeta, ResponseStatus};

/// Message used by [`validation_error`].
pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed";

/// Default message of [`paginated_success`].
pub const PAGINATED_DEFAULT_MESSAGE: &str = "Data retrieved successfully";

/// Default message of [`created`].
pub const CREATED_DEFAULT_MESSAGE: &str = "Resource created successfully";

/// Default message of [`no_content`].
pub const NO_CONTENT_DEFAULT_MESSAGE: &str = "Resource deleted successfully";

/// Fallback message for error responses built with an empty message.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Current instant in the wire timestamp format.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn meta(request_id: Option<&str>) -> ResponseMeta {
    ResponseMeta {
        timestamp: now_timestamp(),
        request_id: request_id.map(str::to_string),
        pagination: None,
    }
}

/// `status = success` carrying `data`.
pub fn success<T>(data: T, message: Option<&str>, request_id: Option<&str>) -> Response<T> {
    Response {
        status: ResponseStatus::Success,
        data: Some(data),
        message: message.map(str::to_string),
        error: None,
        meta: meta(request_id),
    }
}

/// `status = error`.
///
/// An empty `code` falls back to `INTERNAL_ERROR` and an empty `message` to
/// [`INTERNAL_ERROR_MESSAGE`], so the result is always well formed.
pub fn error_response(
    message: impl Into<String>,
    code: impl Into<String>,
    details: Option<Value>,
    request_id: Option<&str>,
) -> Response {
    let mut message = message.into();
    if message.is_empty() {
        message = INTERNAL_ERROR_MESSAGE.to_string();
    }
    let mut code = code.into();
    if code.is_empty() {
        code = ErrorCode::Internal.into();
    }

    Response {
        status: ResponseStatus::Error,
        data: None,
        message: None,
        error: Some(ErrorBody {
            code,
            message,
            details,
        }),
        meta: meta(request_id),
    }
}

/// `error_response(message, INTERNAL_ERROR)`.
pub fn internal_error(message: impl Into<String>) -> Response {
    error_response(message, ErrorCode::Internal, None, None)
}

/// `error_response("Validation failed", VALIDATION_ERROR, details)`.
pub fn validation_error(details: Value, request_id: Option<&str>) -> Response {
    error_response(
        VALIDATION_FAILED_MESSAGE,
        ErrorCode::Validation,
        Some(details),
        request_id,
    )
}

/// Success response with pagination metadata.
///
/// `totalPages = ceil(total / limit)`, `hasPrev = page > 1`,
/// `hasNext = page < totalPages`.
///
/// # Errors
///
/// [`EnvelopeError::InvalidArgument`] if `page < 1`, `limit < 1` or
/// `total < 0`.
pub fn paginated_success<T>(
    data: T,
    page: i64,
    limit: i64,
    total: i64,
    message: Option<&str>,
    request_id: Option<&str>,
) -> Result<Response<T>, EnvelopeError> {
    if page < 1 || limit < 1 || total < 0 {
        return Err(EnvelopeError::InvalidArgument(format!(
            "invalid pagination parameters: page={page}, limit={limit}, total={total}"
        )));
    }

    // Validated non-negative above.
    let (page, limit, total) = (page as u64, limit as u64, total as u64);
    let total_pages = total.div_ceil(limit);

    let mut meta = meta(request_id);
    meta.pagination = Some(PaginationMeta {
        page,
        limit,
        total,
        total_pages,
        has_prev: page > 1,
        has_next: page < total_pages,
    });

    Ok(Response {
        status: ResponseStatus::Success,
        data: Some(data),
        message: Some(message.unwrap_or(PAGINATED_DEFAULT_MESSAGE).to_string()),
        error: None,
        meta,
    })
}

/// Success for a newly created resource.
pub fn created<T>(data: T, message: Option<&str>, request_id: Option<&str>) -> Response<T> {
    success(
        data,
        Some(message.unwrap_or(CREATED_DEFAULT_MESSAGE)),
        request_id,
    )
}

/// Success without data.
pub fn no_content(message: Option<&str>, request_id: Option<&str>) -> Response {
    Response {
        status: ResponseStatus::Success,
        data: None,
        message: Some(message.unwrap_or(NO_CONTENT_DEFAULT_MESSAGE).to_string()),
        error: None,
        meta: meta(request_id),
    }
}

/// `status = warning`.
pub fn warning(message: impl Into<String>, data: Option<Value>, request_id: Option<&str>) -> Response {
    Response {
        status: ResponseStatus::Warning,
        data,
        message: Some(message.into()),
        error: None,
        meta: meta(request_id),
    }
}

/// `status = info`.
pub fn info(message: impl Into<String>, data: Option<Value>, request_id: Option<&str>) -> Response {
    Response {
        status: ResponseStatus::Info,
        data,
        message: Some(message.into()),
        error: None,
        meta: meta(request_id),
    }
}
