//! # Operation Handlers
//!
//! The operations this node serves, and the router that maps them.

pub mod health;
pub mod members;

pub use health::{health_check, HEALTH_CHECK};
pub use members::{MembersExample, EXAMPLE_MEMBERS, GET_MEMBERS_BY_CHURCH, GET_MEMBER_BY_ID};

use crate::container::NodeConfig;
use rpc_bridge::{DispatchError, OperationRouter, RpcCaller};
use std::sync::Arc;

/// Register every operation of this node.
pub fn build_router(
    config: &NodeConfig,
    caller: Arc<dyn RpcCaller>,
) -> Result<OperationRouter, DispatchError> {
    let mut router = OperationRouter::new();
    router.register(
        HEALTH_CHECK,
        health_check(config.service_name.clone(), config.service_version.clone()),
    )?;
    router.register(
        EXAMPLE_MEMBERS,
        Arc::new(MembersExample::new(caller, config.members_queue.clone())),
    )?;
    Ok(router)
}
