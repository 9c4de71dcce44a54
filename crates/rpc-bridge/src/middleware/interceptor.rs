//! Dispatch interceptor: one inbound delivery in, one reply out.
//!
//! Steps, in order:
//! 1. Extract the [`RequestContext`] from the broker metadata
//! 2. Decode the payload (a decode failure counts as a handler failure)
//! 3. Invoke the handler
//! 4. Build the reply: success output is wrapped unless it already is an
//!    envelope, failures are normalized
//! 5. Publish the reply to the reply address, tagged with the token
//! 6. Ack on success; on failure hand the failure back to the caller, which
//!    rejects the delivery
//!
//! Without a reply address the reply is logged and discarded.

use crate::domain::context::RequestContext;
use crate::domain::error::DispatchError;
use crate::ipc::codec;
use crate::ports::inbound::HandlerDispatch;
use shared_bus::{BrokerChannel, Delivery};
use shared_types::{normalize, Response};
use std::sync::Arc;
use tracing::debug;

pub struct DispatchInterceptor {
    channel: Arc<dyn BrokerChannel>,
    handler: Arc<dyn HandlerDispatch>,
}

impl DispatchInterceptor {
    pub fn new(channel: Arc<dyn BrokerChannel>, handler: Arc<dyn HandlerDispatch>) -> Self {
        Self { channel, handler }
    }

    /// Process one delivery.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::Handler`] when the handler failed; the normalized
    ///   error reply has already been published
    /// - [`DispatchError::Transport`] when the reply or ack could not be sent
    pub async fn handle_delivery(&self, delivery: &Delivery) -> Result<(), DispatchError> {
        let ctx = RequestContext::from_delivery(delivery);

        let (ctx, result) = match codec::decode_payload(&delivery.body) {
            Ok(payload) => {
                let ctx = ctx.with_payload(&payload);
                let result = self.handler.invoke(&ctx, payload).await;
                (ctx, result)
            }
            Err(failure) => (ctx, Err(failure)),
        };

        let request_id = ctx.request_id.as_deref();
        match result {
            Ok(output) => {
                self.send_reply(&ctx, &output.into_response(request_id))
                    .await?;
                self.channel.ack(delivery.delivery_tag).await?;
                Ok(())
            }
            Err(failure) => {
                self.send_reply(&ctx, &normalize(&failure, request_id))
                    .await?;
                Err(DispatchError::Handler(failure))
            }
        }
    }

    async fn send_reply(&self, ctx: &RequestContext, reply: &Response) -> Result<(), DispatchError> {
        let Some(reply_to) = ctx.reply_address.as_deref() else {
            debug!(
                operation = %ctx.operation,
                status = ?reply.status,
                "No reply address, reply discarded"
            );
            return Ok(());
        };

        let message = codec::encode_reply(reply, ctx.correlation_token.as_ref())
            .map_err(|e| DispatchError::Encode(e.to_string()))?;
        self.channel.publish(reply_to, message).await?;

        debug!(
            operation = %ctx.operation,
            correlation_id = ?ctx.correlation_token.as_ref().map(|t| t.as_str()),
            reply_to = %reply_to,
            "Reply published"
        );
        Ok(())
    }
}
