//! # Dispatch Flows
//!
//! Inbound decoding, correlation under concurrency and timeout isolation,
//! exercised over the in-memory broker against the stub members service.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{long_lived_client, MembersStub, MEMBERS_QUEUE};
    use rpc_bridge::{RpcCaller, RpcRequest};
    use serde_json::json;
    use shared_bus::{
        BrokerChannel, ConsumeOptions, InMemoryBroker, MessageProperties, OutboundMessage,
    };
    use shared_types::{normalize, HandlerFailure, Response};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    /// Publish a raw body to the members queue and wait for the reply.
    async fn raw_round_trip(broker: &InMemoryBroker, body: &'static [u8]) -> Response {
        let channel = broker.channel();
        let reply_queue = channel.declare_exclusive_queue().await.unwrap();
        let mut replies = channel
            .consume(&reply_queue, ConsumeOptions::no_ack())
            .await
            .unwrap();

        let properties = MessageProperties::new()
            .with_correlation_id("raw-1")
            .with_reply_to(reply_queue.as_str());
        channel
            .publish(
                MEMBERS_QUEUE,
                OutboundMessage::new(body).with_properties(properties),
            )
            .await
            .unwrap();

        let reply = tokio::time::timeout(Duration::from_secs(2), replies.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.properties.correlation_id.as_deref(), Some("raw-1"));
        serde_json::from_slice(&reply.body).unwrap()
    }

    // =========================================================================
    // DECODING
    // =========================================================================

    #[tokio::test]
    async fn test_undecodable_requests_get_error_replies_and_are_rejected() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;

        let empty = raw_round_trip(&broker, b"").await;
        assert_eq!(empty.error_code(), Some("EMPTY_MESSAGE"));
        assert!(empty.is_well_formed());

        let garbled = raw_round_trip(&broker, b"{not json").await;
        assert_eq!(garbled.error_code(), Some("INVALID_JSON"));
        assert!(garbled
            .error
            .unwrap()
            .message
            .starts_with("Failed to parse JSON"));

        // Rejection happens after the reply is sent.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(stub.dispatcher.stats().failed.load(Ordering::Relaxed), 2);
        assert_eq!(broker.unacked_count(), 0);
        assert_eq!(broker.queue_depth(MEMBERS_QUEUE), Some(0));

        stub.stop().await;
    }

    #[tokio::test]
    async fn test_request_id_is_echoed_in_reply_meta() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        let client = long_lived_client(&broker).await;

        let response = assert_ok!(
            client
                .call(RpcRequest::new(
                    MEMBERS_QUEUE,
                    "getById",
                    json!({ "memberId": "m1", "requestId": "req-42" }),
                ))
                .await
        );
        assert_eq!(response.meta.request_id.as_deref(), Some("req-42"));

        client.shutdown().await;
        stub.stop().await;
    }

    // =========================================================================
    // CORRELATION
    // =========================================================================

    #[tokio::test]
    async fn test_concurrent_calls_each_receive_their_own_reply() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        let client = long_lived_client(&broker).await;

        let calls = (0..50).map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let id = format!("m{i}");
                let response = client
                    .call(RpcRequest::new(
                        MEMBERS_QUEUE,
                        "getById",
                        json!({ "memberId": id }),
                    ))
                    .await
                    .unwrap();
                (id, response)
            })
        });

        for call in calls.collect::<Vec<_>>() {
            let (id, response) = call.await.unwrap();
            assert_eq!(response.data.unwrap()["id"], json!(id));
        }

        let stats = client.registry().stats();
        assert_eq!(stats.total_registered.load(Ordering::Relaxed), 50);
        assert_eq!(stats.total_completed.load(Ordering::Relaxed), 50);
        assert_eq!(stats.total_late_replies.load(Ordering::Relaxed), 0);
        assert_eq!(client.pending_count(), 0);

        client.shutdown().await;
        stub.stop().await;
    }

    #[tokio::test]
    async fn test_timeout_does_not_disturb_concurrent_calls() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        let client = long_lived_client(&broker).await;

        let slow = client.call(
            RpcRequest::new(MEMBERS_QUEUE, "slow", json!({ "delay_ms": 200 }))
                .with_timeout(Duration::from_millis(50)),
        );
        let fast = client.call(RpcRequest::new(
            MEMBERS_QUEUE,
            "getById",
            json!({ "memberId": "m7" }),
        ));
        let (slow, fast) = tokio::join!(slow, fast);

        let err = assert_err!(slow);
        assert!(err.is_timeout());
        let fast = assert_ok!(fast);
        assert_eq!(fast.data.unwrap()["id"], json!("m7"));

        // The slow reply still arrives and is dropped.
        tokio::time::sleep(Duration::from_millis(300)).await;
        let stats = client.registry().stats();
        assert_eq!(stats.total_timeouts.load(Ordering::Relaxed), 1);
        assert_eq!(stats.total_late_replies.load(Ordering::Relaxed), 1);
        assert_eq!(client.pending_count(), 0);

        client.shutdown().await;
        stub.stop().await;
    }

    // =========================================================================
    // NORMALIZATION
    // =========================================================================

    #[tokio::test]
    async fn test_wire_error_replies_normalize_to_themselves() {
        let broker = InMemoryBroker::new();
        let stub = MembersStub::start(&broker).await;
        let client = long_lived_client(&broker).await;

        for operation in ["boom", "createMember", "getEverything"] {
            let reply = client
                .call(RpcRequest::new(MEMBERS_QUEUE, operation, json!({})))
                .await
                .unwrap();
            assert!(reply.is_error());
            assert_eq!(normalize(&HandlerFailure::from(reply.clone()), None), reply);
        }

        client.shutdown().await;
        stub.stop().await;
    }
}
