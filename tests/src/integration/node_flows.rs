//! # Node Flows
//!
//! A full node runtime calling the stub members service, both sharing one
//! in-memory broker.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        long_lived_client, silent_queue, valid_user, MembersStub, CHURCH_ID, USER_ID,
    };
    use node_runtime::{NodeConfig, NodeRuntime};
    use rpc_bridge::{RpcClient, RpcRequest};
    use serde_json::{json, Value};
    use shared_bus::InMemoryBroker;
    use shared_types::{Response, ResponseStatus};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::assert_ok;

    const NODE_QUEUE: &str = "example_under_test";

    struct Harness {
        broker: InMemoryBroker,
        node: NodeRuntime,
        client: Arc<RpcClient>,
        stub: MembersStub,
    }

    impl Harness {
        async fn start(configure: impl FnOnce(&mut NodeConfig)) -> Self {
            let broker = InMemoryBroker::new();
            let stub = MembersStub::start(&broker).await;

            let mut config = NodeConfig::new("memory://node-flows");
            config.service_queue = NODE_QUEUE.into();
            configure(&mut config);
            let node = NodeRuntime::start_with_connector(config, Arc::new(broker.clone()))
                .await
                .unwrap();
            let client = long_lived_client(&broker).await;

            Self {
                broker,
                node,
                client,
                stub,
            }
        }

        async fn call(&self, operation: &str, payload: Value) -> Response {
            assert_ok!(
                self.client
                    .call(RpcRequest::new(NODE_QUEUE, operation, payload))
                    .await
            )
        }

        async fn stop(self) {
            self.client.shutdown().await;
            self.node.shutdown().await;
            self.stub.stop().await;
            assert_eq!(self.broker.consumer_count(NODE_QUEUE), 0);
        }
    }

    #[tokio::test]
    async fn test_health_check_reports_service_identity() {
        let harness = Harness::start(|config| {
            config.service_name = "example-service".into();
            config.service_version = "1.2.3".into();
        })
        .await;

        let response = harness.call("health.check", json!({})).await;
        assert_eq!(response.status, ResponseStatus::Success);
        let data = response.data.unwrap();
        assert_eq!(data["status"], json!("ok"));
        assert_eq!(data["service"], json!("example-service"));
        assert_eq!(data["version"], json!("1.2.3"));

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_members_lookup_by_id() {
        let harness = Harness::start(|_| {}).await;

        let response = harness
            .call(
                "example.members",
                json!({ "user": valid_user(), "memberId": "m42" }),
            )
            .await;

        let data = response.data.unwrap();
        assert_eq!(data["ok"], json!(true));
        assert_eq!(data["user"]["id"], json!(USER_ID));
        let members = &data["membersResponse"];
        assert_eq!(members["status"], json!("success"));
        assert_eq!(members["data"], json!({ "id": "m42", "name": "Ann" }));

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_members_lookup_by_church() {
        let harness = Harness::start(|_| {}).await;

        let response = harness
            .call("example.members", json!({ "user": valid_user() }))
            .await;

        let data = response.data.unwrap();
        assert_eq!(
            data["membersResponse"]["data"],
            json!([{ "id": "m1", "church": CHURCH_ID }])
        );

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_members_lookup_requires_user() {
        let harness = Harness::start(|_| {}).await;

        let response = harness
            .call("example.members", json!({ "memberId": "m42" }))
            .await;

        assert_eq!(response.status, ResponseStatus::Error);
        assert_eq!(response.error_code(), Some("MISSING_USER"));
        assert!(response.is_well_formed());

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_downstream_timeout_becomes_internal_error_reply() {
        let harness = Harness::start(|config| {
            config.members_queue = "members_silent".into();
            config.rpc_default_timeout = Duration::from_millis(50);
        })
        .await;
        silent_queue(&harness.broker, "members_silent").await;

        let response = harness
            .call(
                "example.members",
                json!({ "user": valid_user(), "memberId": "m42" }),
            )
            .await;

        assert_eq!(response.error_code(), Some("INTERNAL_ERROR"));
        assert_eq!(harness.node.client().pending_count(), 0);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_nodes_sharing_a_memory_url_call_each_other() {
        let url = "memory://node-flows-cluster";
        let node = |queue: &str, name: &str| {
            let mut config = NodeConfig::new(url);
            config.service_queue = queue.into();
            config.service_name = name.into();
            config
        };
        let node_a = NodeRuntime::start(node("node_a", "node-a")).await.unwrap();
        let node_b = NodeRuntime::start(node("node_b", "node-b")).await.unwrap();

        let response = assert_ok!(
            node_a
                .client()
                .call(
                    RpcRequest::new("node_b", "health.check", json!({}))
                        .with_timeout(Duration::from_secs(2))
                )
                .await
        );
        assert_eq!(response.data.unwrap()["service"], json!("node-b"));

        node_a.shutdown().await;
        node_b.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_found() {
        let harness = Harness::start(|_| {}).await;

        let response = harness.call("example.nothing", json!({})).await;
        assert_eq!(response.error_code(), Some("NOT_FOUND"));

        harness.stop().await;
    }
}
