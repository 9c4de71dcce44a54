//! # Node Configuration
//!
//! Runtime parameters read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `BROKER_URL` | required (`amqp://...` or `memory://<name>`) |
//! | `RPC_DEFAULT_TIMEOUT_MS` | `60000` |
//! | `SERVICE_QUEUE` | `example_queue` |
//! | `MEMBERS_QUEUE` | `members_v2` |
//! | `DISPATCH_MAX_IN_FLIGHT` | `16` |
//! | `SERVICE_NAME` / `SERVICE_VERSION` | package name / version |

use rpc_bridge::service::DEFAULT_MAX_IN_FLIGHT;
use rpc_bridge::{RpcClientConfig, DEFAULT_RPC_TIMEOUT};
use std::env;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SERVICE_QUEUE: &str = "example_queue";
pub const DEFAULT_MEMBERS_QUEUE: &str = "members_v2";

/// Complete node configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Broker URL. `amqp://` / `amqps://` select RabbitMQ; `memory://<name>`
    /// selects the in-process broker shared by every node using that name.
    pub broker_url: String,
    /// Timeout for outbound calls that do not set their own.
    pub rpc_default_timeout: Duration,
    /// Queue this node serves.
    pub service_queue: String,
    /// Downstream queue of the members service.
    pub members_queue: String,
    /// Concurrent inbound handler invocations.
    pub dispatch_max_in_flight: usize,
    pub service_name: String,
    pub service_version: String,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl NodeConfig {
    /// Configuration with defaults for everything but the broker URL.
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            rpc_default_timeout: DEFAULT_RPC_TIMEOUT,
            service_queue: DEFAULT_SERVICE_QUEUE.to_string(),
            members_queue: DEFAULT_MEMBERS_QUEUE.to_string(),
            dispatch_max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            service_name: env!("CARGO_PKG_NAME").to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let broker_url = lookup("BROKER_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("BROKER_URL"))?;
        let mut config = Self::new(broker_url);

        if let Some(value) = lookup("RPC_DEFAULT_TIMEOUT_MS") {
            let ms = parse_positive("RPC_DEFAULT_TIMEOUT_MS", &value)?;
            config.rpc_default_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup("DISPATCH_MAX_IN_FLIGHT") {
            let n = parse_positive("DISPATCH_MAX_IN_FLIGHT", &value)?;
            config.dispatch_max_in_flight = usize::try_from(n).map_err(|_| ConfigError::Invalid {
                var: "DISPATCH_MAX_IN_FLIGHT",
                value,
                reason: "too large",
            })?;
        }
        if let Some(queue) = non_empty(lookup("SERVICE_QUEUE")) {
            config.service_queue = queue;
        }
        if let Some(queue) = non_empty(lookup("MEMBERS_QUEUE")) {
            config.members_queue = queue;
        }
        if let Some(name) = non_empty(lookup("SERVICE_NAME")) {
            config.service_name = name;
        }
        if let Some(version) = non_empty(lookup("SERVICE_VERSION")) {
            config.service_version = version;
        }

        Ok(config)
    }

    /// The RPC client's view of this configuration.
    pub fn rpc_client_config(&self) -> RpcClientConfig {
        RpcClientConfig::default().with_default_timeout(self.rpc_default_timeout)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "must be greater than zero",
        }),
        Ok(n) => Ok(n),
        Err(_) => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "not a number",
        }),
    }
}
