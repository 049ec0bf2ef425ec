//! Bus configuration.
//!
//! Every field has a default, so an empty environment yields a working
//! configuration. Override with `MICRO_BUS_*` variables:
//!
//! | Variable                       | Default |
//! |--------------------------------|---------|
//! | `MICRO_BUS_DURABLE_QUEUES`     | `false` |
//! | `MICRO_BUS_FAILURE_POLICY`     | `log`   |
//! | `MICRO_BUS_DRAIN_ON_SHUTDOWN`  | `true`  |

use ::config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

use crate::transport::QueueOptions;

const ENV_PREFIX: &str = "MICRO_BUS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration loading failed: {0}")]
    Load(#[from] ::config::ConfigError),
}

/// What a consumer loop does with a message whose dispatch failed.
///
/// Either way the message is treated as consumed and is not retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop silently.
    Discard,
    /// Report to the bus's dispatch observer.
    #[default]
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    /// Declare queues as durable.
    #[serde(default)]
    pub durable_queues: bool,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Wait for in-flight dispatches when a consumer stops.
    #[serde(default = "default_drain_on_shutdown")]
    pub drain_on_shutdown: bool,
}

impl BusConfig {
    /// Load from `MICRO_BUS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn queue_options(&self) -> QueueOptions {
        QueueOptions {
            durable: self.durable_queues,
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            durable_queues: false,
            failure_policy: FailurePolicy::default(),
            drain_on_shutdown: default_drain_on_shutdown(),
        }
    }
}

fn default_drain_on_shutdown() -> bool {
    true
}
