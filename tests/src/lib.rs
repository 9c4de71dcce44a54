//! # Broker RPC Test Suite
//!
//! Cross-crate scenarios run against the in-process broker.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # members service stub, client builders
//!     ├── rpc_contract.rs    # same scenarios against both RPC clients
//!     ├── dispatch_flows.rs  # inbound decode, exactly-once, timeout isolation
//!     └── node_flows.rs      # full node: health.check, example.members
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p node-tests
//! cargo test -p node-tests integration::rpc_contract
//! ```

pub mod integration;
