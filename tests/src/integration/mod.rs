//! # Integration Scenarios
//!
//! Every scenario wires real components over an [`InMemoryBroker`]:
//! requests, replies and acks all go through broker queues.
//!
//! [`InMemoryBroker`]: shared_bus::InMemoryBroker

pub mod fixtures;

mod dispatch_flows;
mod node_flows;
mod rpc_contract;
