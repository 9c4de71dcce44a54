//! # Error Normalizer
//!
//! Maps the failure shapes a handler can raise onto a single error
//! [`Response`]. Evaluated in order, first match wins:
//!
//! | # | Failure                                   | Result                                              |
//! |---|-------------------------------------------|-----------------------------------------------------|
//! | 1 | carries a well-formed error `Response`    | passed through unchanged                            |
//! | 2 | carries only a string                     | `RPC_ERROR` with that message                       |
//! | 3 | carries a structured object or array      | `message ?? "RPC error"`, `code ?? RPC_ERROR`, `details` if present else the payload |
//! | 4 | validation rejection (field messages)     | `validation_error(messages)`                        |
//! | 5 | anything else                             | `message ?? "Internal server error"`, `code ?? INTERNAL_ERROR` |
//!
//! Raw faults never reach the caller: every path ends in a well-formed error
//! envelope, and nothing but explicitly structured `details` is forwarded.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::{error_response, validation_error, INTERNAL_ERROR_MESSAGE};
use crate::errors::ErrorCode;
use crate::response::Response;

/// Message used when a structured RPC failure has no `message` field.
pub const RPC_ERROR_MESSAGE: &str = "RPC error";

/// A failure raised while executing an operation handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerFailure {
    /// A ready-made envelope.
    #[error("handler failed with envelope: {}", envelope_summary(.0))]
    Envelope(Response),

    /// Failure raised explicitly by the handler with an RPC payload: a string,
    /// a structured object, or a serialized envelope.
    #[error("rpc failure: {0}")]
    Rpc(Value),

    /// Input validation rejection with field-level messages.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Any other fault.
    #[error("{}", .message.as_deref().unwrap_or(INTERNAL_ERROR_MESSAGE))]
    Fault {
        message: Option<String>,
        code: Option<String>,
    },
}

fn envelope_summary(response: &Response) -> String {
    match &response.error {
        Some(err) => format!("[{}] {}", err.code, err.message),
        None => format!("{:?}", response.status),
    }
}

impl HandlerFailure {
    /// Plain-message RPC failure.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Rpc(Value::String(message.into()))
    }

    /// Structured RPC failure with a code and message.
    pub fn coded(code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut obj = Map::new();
        obj.insert("code".into(), Value::String(code.into()));
        obj.insert("message".into(), Value::String(message.into()));
        Self::Rpc(Value::Object(obj))
    }

    /// Structured RPC failure with a code, message and details.
    pub fn detailed(code: impl Into<String>, message: impl Into<String>, details: Value) -> Self {
        let mut obj = Map::new();
        obj.insert("code".into(), Value::String(code.into()));
        obj.insert("message".into(), Value::String(message.into()));
        obj.insert("details".into(), details);
        Self::Rpc(Value::Object(obj))
    }

    /// Validation rejection.
    pub fn validation<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation(messages.into_iter().map(Into::into).collect())
    }

    /// Unclassified fault with a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Fault {
            message: Some(message.into()),
            code: None,
        }
    }

    /// Unclassified fault wrapping any error.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::internal(err.to_string())
    }

    /// Classify a raw JSON failure payload.
    ///
    /// The validation-rejection shape `{"response": {"message": [...]}}` maps
    /// to [`HandlerFailure::Validation`]; everything else is treated as an RPC
    /// failure payload.
    pub fn from_value(value: Value) -> Self {
        if let Some(messages) = validation_messages(&value) {
            return Self::Validation(messages);
        }
        Self::Rpc(value)
    }
}

/// Extract field messages from `{"response": {"message": ...}}`.
fn validation_messages(value: &Value) -> Option<Vec<String>> {
    let message = value.get("response")?.get("message")?;
    let messages = match message {
        Value::Array(items) => items.iter().map(value_to_message).collect(),
        Value::Null => return None,
        other => vec![value_to_message(other)],
    };
    Some(messages)
}

fn value_to_message(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<Response> for HandlerFailure {
    fn from(response: Response) -> Self {
        Self::Envelope(response)
    }
}

impl From<serde_json::Error> for HandlerFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(vec![err.to_string()])
    }
}

/// Produce exactly one error [`Response`] for `failure`.
///
/// `request_id` is stamped on newly built envelopes; pass-through envelopes
/// are returned untouched, which makes normalization idempotent.
pub fn normalize(failure: &HandlerFailure, request_id: Option<&str>) -> Response {
    match failure {
        HandlerFailure::Envelope(response) if is_error_envelope(response) => response.clone(),
        HandlerFailure::Envelope(response) => match serde_json::to_value(response) {
            Ok(value) => normalize_rpc_payload(&value, request_id),
            Err(_) => fault(None, None, request_id),
        },
        HandlerFailure::Rpc(value) => normalize_rpc_payload(value, request_id),
        HandlerFailure::Validation(messages) => validation_error(
            Value::Array(messages.iter().cloned().map(Value::String).collect()),
            request_id,
        ),
        HandlerFailure::Fault { message, code } => {
            fault(message.as_deref(), code.as_deref(), request_id)
        }
    }
}

fn is_error_envelope(response: &Response) -> bool {
    response.is_error() && response.is_well_formed()
}

fn normalize_rpc_payload(value: &Value, request_id: Option<&str>) -> Response {
    if let Ok(response) = serde_json::from_value::<Response>(value.clone()) {
        if is_error_envelope(&response) {
            return response;
        }
    }

    match value {
        Value::String(message) => error_response(message.clone(), ErrorCode::Rpc, None, request_id),
        Value::Object(obj) => {
            let message = obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(RPC_ERROR_MESSAGE)
                .to_string();
            let code = obj
                .get("code")
                .and_then(Value::as_str)
                .map_or_else(|| ErrorCode::Rpc.into(), str::to_string);
            // A `details` key is kept even when null.
            let details = obj.get("details").cloned().unwrap_or_else(|| value.clone());
            error_response(message, code, Some(details), request_id)
        }
        Value::Array(_) => error_response(
            RPC_ERROR_MESSAGE,
            ErrorCode::Rpc,
            Some(value.clone()),
            request_id,
        ),
        _ => fault(None, None, request_id),
    }
}

fn fault(message: Option<&str>, code: Option<&str>, request_id: Option<&str>) -> Response {
    error_response(
        message.unwrap_or(INTERNAL_ERROR_MESSAGE),
        code.map_or_else(|| ErrorCode::Internal.into(), str::to_string),
        None,
        request_id,
    )
}
