//! # RPC Client Contract
//!
//! Both clients sit behind `RpcCaller` and must behave the same from the
//! caller's side: a reply (success or error envelope) is `Ok`, no reply is
//! a timeout `Err`.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        ad_hoc_client, long_lived_client, silent_queue, MembersStub, MEMBERS_QUEUE,
    };
    use rpc_bridge::{RpcCaller, RpcRequest};
    use serde_json::json;
    use shared_bus::InMemoryBroker;
    use shared_types::ResponseStatus;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    async fn happy_path(caller: &dyn RpcCaller) {
        let response = caller
            .call(RpcRequest::new(MEMBERS_QUEUE, "getById", json!({ "memberId": "m1" })))
            .await
            .unwrap();

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.data, Some(json!({ "id": "m1", "name": "Ann" })));
        assert!(response.is_well_formed());
    }

    async fn plain_string_failure(caller: &dyn RpcCaller) {
        let response = caller
            .call(RpcRequest::new(MEMBERS_QUEUE, "boom", json!({})))
            .await
            .unwrap();

        let error = response.error.clone().unwrap();
        assert_eq!(error.code, "RPC_ERROR");
        assert_eq!(error.message, "boom");
        assert!(response.is_well_formed());
    }

    async fn validation_rejection(caller: &dyn RpcCaller) {
        let response = caller
            .call(RpcRequest::new(MEMBERS_QUEUE, "createMember", json!({})))
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, "VALIDATION_ERROR");
        assert_eq!(error.details, Some(json!(["name is required"])));
    }

    async fn unknown_operation(caller: &dyn RpcCaller) {
        let response = caller
            .call(RpcRequest::new(MEMBERS_QUEUE, "getEverything", json!({})))
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, "NOT_FOUND");
        assert_eq!(error.message, "Unknown operation: getEverything");
    }

    async fn no_reply_times_out(caller: &dyn RpcCaller) {
        let started = Instant::now();
        let result = caller
            .call(
                RpcRequest::new("nobody_home", "ping", json!({}))
                    .with_timeout(Duration::from_millis(50)),
            )
            .await;

        assert!(result.unwrap_err().is_timeout());
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(500), "timed out late: {elapsed:?}");
    }

    // =========================================================================
    // LONG-LIVED CLIENT
    // =========================================================================

    #[tokio::test]
    async fn test_long_lived_client_contract() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        silent_queue(&broker, "nobody_home").await;
        let client = long_lived_client(&broker).await;

        happy_path(client.as_ref()).await;
        plain_string_failure(client.as_ref()).await;
        validation_rejection(client.as_ref()).await;
        unknown_operation(client.as_ref()).await;
        no_reply_times_out(client.as_ref()).await;

        // Nothing left behind, not even the timed-out call.
        assert_eq!(client.pending_count(), 0);

        client.shutdown().await;
        stub.stop().await;
    }

    // =========================================================================
    // AD-HOC CLIENT
    // =========================================================================

    #[tokio::test]
    async fn test_ad_hoc_client_contract() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        silent_queue(&broker, "nobody_home").await;
        let client = ad_hoc_client(&broker);

        happy_path(client.as_ref()).await;
        plain_string_failure(client.as_ref()).await;
        validation_rejection(client.as_ref()).await;
        unknown_operation(client.as_ref()).await;
        no_reply_times_out(client.as_ref()).await;

        stub.stop().await;
    }

    #[tokio::test]
    async fn test_clients_are_interchangeable_behind_trait_object() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;

        let long_lived: Arc<dyn RpcCaller> = long_lived_client(&broker).await;
        let ad_hoc: Arc<dyn RpcCaller> = ad_hoc_client(&broker);
        for caller in [long_lived, ad_hoc] {
            let response = caller
                .call(RpcRequest::new(
                    MEMBERS_QUEUE,
                    "getMembersByChurch",
                    json!({ "user": { "church": "c1" } }),
                ))
                .await
                .unwrap();
            assert_eq!(response.data, Some(json!([{ "id": "m1", "church": "c1" }])));
        }

        stub.stop().await;
    }
}
