//! Request context handed to operation handlers.
//!
//! Built by the dispatch interceptor before the handler runs: broker
//! metadata first (operation header, reply address, correlation token), then
//! the fields read from the decoded payload (request id, user object).

use crate::domain::correlation::CorrelationToken;
use serde_json::Value;
use shared_bus::Delivery;
use shared_types::HandlerFailure;

/// Payload field carrying the caller's identity.
pub const USER_FIELD: &str = "user";

/// Payload field naming the operation when the header is absent.
pub const OPERATION_FIELD: &str = "operation";

/// Payload field carrying a caller-supplied request id.
pub const REQUEST_ID_FIELD: &str = "requestId";

/// Per-request metadata, extracted once per inbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub operation: String,
    pub correlation_token: Option<CorrelationToken>,
    /// Queue the reply goes to. `None` means fire-and-forget.
    pub reply_address: Option<String>,
    /// Echoed in `meta.requestId` of the reply.
    pub request_id: Option<String>,
    /// The payload's `user` object, unvalidated.
    pub user: Option<Value>,
}

impl RequestContext {
    /// Context for a named operation with no broker metadata.
    #[must_use]
    pub fn for_operation(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    /// Read the broker metadata of a delivery.
    #[must_use]
    pub fn from_delivery(delivery: &Delivery) -> Self {
        let props = &delivery.properties;
        Self {
            operation: props.operation().unwrap_or_default().to_string(),
            correlation_token: props
                .correlation_id
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(CorrelationToken::from),
            reply_address: props.reply_to.clone().filter(|r| !r.is_empty()),
            request_id: None,
            user: None,
        }
    }

    /// Fill in the fields that live in the decoded payload.
    ///
    /// The request id defaults to the correlation token.
    #[must_use]
    pub fn with_payload(mut self, payload: &Value) -> Self {
        if self.operation.is_empty() {
            if let Some(op) = payload.get(OPERATION_FIELD).and_then(Value::as_str) {
                self.operation = op.to_string();
            }
        }
        self.request_id = payload
            .get(REQUEST_ID_FIELD)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.correlation_token.as_ref().map(|t| t.to_string()));
        self.user = payload.get(USER_FIELD).cloned();
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: Value) -> Self {
        self.user = Some(user);
        self
    }

    /// Validate and return the caller's identity.
    ///
    /// # Errors
    ///
    /// A structured failure with one of the `MISSING_USER`, `INVALID_*`
    /// codes describing the first rule the user object breaks.
    pub fn user(&self) -> Result<UserContext, HandlerFailure> {
        UserContext::validate(self.user.as_ref())
    }
}

/// Organization or church reference attached to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeInfo {
    pub id: String,
    pub name: Option<String>,
}

/// A validated user object.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    pub id: String,
    pub email: Option<String>,
    pub permissions: Vec<String>,
    pub organization: Option<String>,
    pub church: Option<String>,
    pub organization_info: Option<ScopeInfo>,
    pub church_info: Option<ScopeInfo>,
    raw: Value,
}

fn is_object_id(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn invalid(code: &str, message: &str) -> HandlerFailure {
    HandlerFailure::coded(code, message)
}

fn scope_info(value: &Value) -> Option<ScopeInfo> {
    let obj = value.as_object()?;
    let id = obj.get("id").filter(|id| is_object_id(id))?;
    Some(ScopeInfo {
        id: id.as_str()?.to_string(),
        name: obj.get("name").and_then(Value::as_str).map(str::to_string),
    })
}

impl UserContext {
    fn validate(user: Option<&Value>) -> Result<Self, HandlerFailure> {
        let Some(obj) = user.and_then(Value::as_object) else {
            return Err(invalid(
                "MISSING_USER",
                "payload.user is required and must be an object.",
            ));
        };

        let id = match obj.get("id") {
            Some(id) if is_object_id(id) => id.as_str().unwrap_or_default().to_string(),
            _ => {
                return Err(invalid(
                    "INVALID_USER_ID",
                    "user.id must be a valid ObjectId (24 hex chars).",
                ))
            }
        };

        let email = match obj.get("email") {
            None => None,
            Some(Value::String(email)) => Some(email.clone()),
            Some(_) => {
                return Err(invalid(
                    "INVALID_USER_EMAIL",
                    "user.email must be a string if provided.",
                ))
            }
        };

        let permissions = match obj.get("permissions") {
            None => Vec::new(),
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(_) => {
                return Err(invalid(
                    "INVALID_PERMISSIONS",
                    "user.permissions must be an array of strings if provided.",
                ))
            }
        };

        let organization = match obj.get("organization") {
            None => None,
            Some(v) if is_object_id(v) => v.as_str().map(str::to_string),
            Some(_) => {
                return Err(invalid(
                    "INVALID_ORGANIZATION_ID",
                    "user.organization must be an ObjectId if provided.",
                ))
            }
        };

        let church = match obj.get("church") {
            None => None,
            Some(v) if is_object_id(v) => v.as_str().map(str::to_string),
            Some(_) => {
                return Err(invalid(
                    "INVALID_CHURCH_ID",
                    "user.church must be an ObjectId if provided.",
                ))
            }
        };

        let organization_info = match obj.get("organization_info") {
            None => None,
            Some(v) => Some(scope_info(v).ok_or_else(|| {
                invalid(
                    "INVALID_ORGANIZATION_INFO",
                    "user.organization_info must be an object with a valid id.",
                )
            })?),
        };

        let church_info = match obj.get("church_info") {
            None => None,
            Some(v) => Some(scope_info(v).ok_or_else(|| {
                invalid(
                    "INVALID_CHURCH_INFO",
                    "user.church_info must be an object with a valid id.",
                )
            })?),
        };

        Ok(Self {
            id,
            email,
            permissions,
            organization,
            church,
            organization_info,
            church_info,
            raw: Value::Object(obj.clone()),
        })
    }

    /// The user object as received, including fields not modelled here.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.raw
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}
