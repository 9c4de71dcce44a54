//! `example.members`: forwards a members lookup to the members service.
//!
//! With a `memberId` in the payload the lookup is `getMemberById`,
//! otherwise `getMembersByChurch` for the caller's church. The downstream
//! reply is returned as is, error envelopes included, next to the caller's
//! user object.

use rpc_bridge::{
    HandlerOutput, HandlerResult, OperationHandler, RequestContext, RpcCaller, RpcRequest,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared_types::HandlerFailure;
use std::sync::Arc;
use tracing::debug;

pub const EXAMPLE_MEMBERS: &str = "example.members";
pub const GET_MEMBER_BY_ID: &str = "getMemberById";
pub const GET_MEMBERS_BY_CHURCH: &str = "getMembersByChurch";

pub struct MembersExample {
    caller: Arc<dyn RpcCaller>,
    members_queue: String,
}

impl MembersExample {
    pub fn new(caller: Arc<dyn RpcCaller>, members_queue: impl Into<String>) -> Self {
        Self {
            caller,
            members_queue: members_queue.into(),
        }
    }

    /// The downstream request for `payload`.
    fn lookup(&self, payload: &Value, church: Option<&str>) -> RpcRequest {
        let member_id = payload.get("memberId").filter(|id| match id {
            Value::Null => false,
            Value::String(s) => !s.is_empty(),
            _ => true,
        });

        let (operation, body) = match member_id {
            Some(member_id) => (
                GET_MEMBER_BY_ID,
                json!({ "data": { "memberId": member_id }, "operation": GET_MEMBER_BY_ID }),
            ),
            None => (
                GET_MEMBERS_BY_CHURCH,
                json!({ "user": { "church": church }, "operation": GET_MEMBERS_BY_CHURCH }),
            ),
        };
        RpcRequest::new(self.members_queue.as_str(), operation, body)
    }
}

#[async_trait]
impl OperationHandler for MembersExample {
    async fn handle(&self, ctx: &RequestContext, payload: Value) -> HandlerResult {
        let user = ctx.user()?;
        let request = self.lookup(&payload, user.church.as_deref());
        debug!(
            operation = %request.operation,
            queue = %request.target_queue,
            user_id = %user.id,
            "Forwarding members lookup"
        );

        let members_response = self
            .caller
            .call(request)
            .await
            .map_err(|e| HandlerFailure::from_error(&e))?;

        Ok(HandlerOutput::Data(json!({
            "ok": true,
            "user": user.as_value(),
            "membersResponse": members_response,
        })))
    }
}
