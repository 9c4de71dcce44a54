//! # Test Fixtures
//!
//! A stub members service served by a real [`Dispatcher`], and builders for
//! both RPC clients.

use rpc_bridge::{
    handler_fn, AdHocRpcClient, Dispatcher, DispatcherConfig, HandlerOutput, OperationRouter,
    RpcClient, RpcClientConfig,
};
use serde_json::{json, Value};
use shared_bus::{BrokerChannel, InMemoryBroker};
use shared_types::HandlerFailure;
use std::sync::Arc;
use std::time::Duration;

pub const MEMBERS_QUEUE: &str = "members_v2";

pub const USER_ID: &str = "64b7f0c2a1b2c3d4e5f60718";
pub const CHURCH_ID: &str = "64b7f0c2a1b2c3d4e5f60719";

/// A user object that passes validation.
pub fn valid_user() -> Value {
    json!({
        "id": USER_ID,
        "email": "ann@example.org",
        "permissions": ["members.read"],
        "church": CHURCH_ID,
        "church_info": { "id": CHURCH_ID, "name": "Grace" },
    })
}

fn member_id(payload: &Value) -> Option<&str> {
    payload
        .get("memberId")
        .or_else(|| payload.get("data").and_then(|d| d.get("memberId")))
        .and_then(Value::as_str)
}

/// Operations of the stub members service.
///
/// - `getById` / `getMemberById`: `{id, name}` for the given `memberId`
/// - `getMembersByChurch`: one member of `user.church`
/// - `createMember`: validation failure unless `name` is given
/// - `boom`: plain-string failure
/// - `slow`: echoes the payload after `delay_ms`
pub fn members_router() -> OperationRouter {
    let mut router = OperationRouter::new();

    let get_by_id = || {
        handler_fn(|_ctx, payload: Value| async move {
            match member_id(&payload) {
                Some(id) => Ok(HandlerOutput::Data(json!({ "id": id, "name": "Ann" }))),
                None => Err(HandlerFailure::validation(["memberId is required"])),
            }
        })
    };
    let registrations = [
        ("getById", get_by_id()),
        ("getMemberById", get_by_id()),
        (
            "getMembersByChurch",
            handler_fn(|_ctx, payload: Value| async move {
                let church = payload["user"]["church"].clone();
                Ok(HandlerOutput::Data(json!([{ "id": "m1", "church": church }])))
            }),
        ),
        (
            "createMember",
            handler_fn(|_ctx, payload: Value| async move {
                match payload.get("name").and_then(Value::as_str) {
                    Some(name) => Ok(HandlerOutput::Data(json!({ "name": name }))),
                    None => Err(HandlerFailure::validation(["name is required"])),
                }
            }),
        ),
        (
            "boom",
            handler_fn(|_ctx, _payload| async move { Err(HandlerFailure::message("boom")) }),
        ),
        (
            "slow",
            handler_fn(|_ctx, payload: Value| async move {
                let delay = payload["delay_ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(HandlerOutput::Data(payload))
            }),
        ),
    ];

    for (operation, handler) in registrations {
        router
            .register(operation, handler)
            .expect("stub operations are unique");
    }
    router
}

/// The stub members service, consuming [`MEMBERS_QUEUE`].
pub struct MembersStub {
    pub dispatcher: Dispatcher,
    channel: Arc<dyn BrokerChannel>,
}

impl MembersStub {
    pub async fn start(broker: &InMemoryBroker) -> Self {
        let channel: Arc<dyn BrokerChannel> = Arc::new(broker.channel());
        let dispatcher = Dispatcher::start(
            Arc::clone(&channel),
            Arc::new(members_router()),
            DispatcherConfig::new(MEMBERS_QUEUE),
        )
        .await
        .expect("members stub starts");
        Self {
            dispatcher,
            channel,
        }
    }

    pub async fn stop(self) {
        self.dispatcher.shutdown().await;
        let _ = self.channel.close().await;
    }
}

/// Declare a queue nobody consumes.
pub async fn silent_queue(broker: &InMemoryBroker, name: &str) {
    broker
        .channel()
        .declare_queue(name)
        .await
        .expect("queue declared");
}

pub async fn long_lived_client(broker: &InMemoryBroker) -> Arc<RpcClient> {
    Arc::new(
        RpcClient::start(Arc::new(broker.channel()), RpcClientConfig::default())
            .await
            .expect("client starts"),
    )
}

pub fn ad_hoc_client(broker: &InMemoryBroker) -> Arc<AdHocRpcClient> {
    Arc::new(AdHocRpcClient::new(
        Arc::new(broker.clone()),
        RpcClientConfig::default(),
    ))
}
