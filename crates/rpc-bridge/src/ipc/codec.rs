//! Wire codec for requests and replies.
//!
//! Bodies are UTF-8 JSON. Request metadata travels in broker properties:
//! `correlation_id`, `reply_to`, `expiration` and the `operation` header.

use crate::domain::correlation::CorrelationToken;
use crate::domain::error::RpcError;
use crate::ports::outbound::RpcRequest;
use serde_json::Value;
use shared_bus::{MessageProperties, OutboundMessage, OPERATION_HEADER};
use shared_types::envelope::error_response;
use shared_types::{HandlerFailure, Response};
use std::time::Duration;

/// Build the broker message for an outbound request.
///
/// # Errors
///
/// [`RpcError::Encode`] if the payload cannot be serialized.
pub fn encode_request(
    request: &RpcRequest,
    token: &CorrelationToken,
    reply_to: &str,
    timeout: Duration,
) -> Result<OutboundMessage, RpcError> {
    let message =
        OutboundMessage::json(&request.payload).map_err(|e| RpcError::Encode(e.to_string()))?;
    Ok(message.with_properties(
        MessageProperties::new()
            .with_correlation_id(token.as_str())
            .with_reply_to(reply_to)
            .with_expiration(timeout)
            .with_header(OPERATION_HEADER, request.operation.as_str()),
    ))
}

/// Build the reply message, echoing the request's token.
///
/// # Errors
///
/// Returns the serializer error if the envelope cannot be encoded.
pub fn encode_reply(
    response: &Response,
    token: Option<&CorrelationToken>,
) -> Result<OutboundMessage, serde_json::Error> {
    let mut properties = MessageProperties::new();
    if let Some(token) = token {
        properties = properties.with_correlation_id(token.as_str());
    }
    Ok(OutboundMessage::json(response)?.with_properties(properties))
}

/// Error code of a reply that could not be decoded locally. Distinct from
/// `INTERNAL_ERROR`, which a remote handler may send itself.
pub const DECODE_ERROR: &str = "DECODE_ERROR";

/// Decode a reply body. Never fails: a body that is not JSON, or JSON that
/// is not a response envelope, becomes a `DECODE_ERROR` envelope.
#[must_use]
pub fn decode_reply(body: &[u8]) -> Response {
    let value = match serde_json::from_slice::<Value>(body) {
        Ok(value) => value,
        Err(e) => {
            return error_response(format!("Failed to parse JSON: {e}"), DECODE_ERROR, None, None)
        }
    };
    match serde_json::from_value::<Response>(value) {
        Ok(response) => response,
        Err(e) => error_response(
            format!("Reply is not a response envelope: {e}"),
            DECODE_ERROR,
            None,
            None,
        ),
    }
}

/// Decode an inbound request payload.
///
/// # Errors
///
/// `EMPTY_MESSAGE` for an empty body and `INVALID_JSON` for a body that is
/// not JSON, both as structured handler failures.
pub fn decode_payload(body: &[u8]) -> Result<Value, HandlerFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(HandlerFailure::coded(
            "EMPTY_MESSAGE",
            "Message content is empty.",
        ));
    }
    serde_json::from_slice(body).map_err(|e| {
        HandlerFailure::coded("INVALID_JSON", format!("Failed to parse JSON: {e}"))
    })
}
