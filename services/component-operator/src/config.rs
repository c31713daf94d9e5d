use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

use component_core::configs::{RuntimeImages, runtimes_default};
use config::{ConfigBuilder, ConfigError, Environment, File, builder::AsyncState};
use factory::factories::observability::ObservabilityConfig;
use serde::Deserialize;

use crate::services::route_resolver::RoutePolling;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server_address: SocketAddr,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub kubernetes: KubernetesSettings,
    #[serde(default)]
    pub operator: OperatorConfig,
}

impl Config {
    pub async fn init(path: PathBuf) -> Result<Self, ConfigError> {
        let cfg = ConfigBuilder::<AsyncState>::default()
            .add_source(File::from(path))
            .add_source(Environment::default())
            .build()
            .await?;

        cfg.try_deserialize()
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct KubernetesSettings {
    #[serde(default)]
    pub in_cluster: bool,
    pub kubeconfig: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct OperatorConfig {
    /// Watch a single namespace instead of the whole cluster
    pub watch_namespace: Option<String>,
    #[serde(default = "concurrency_default")]
    pub concurrency: u16,
    #[serde(default = "field_manager_default")]
    pub field_manager: String,
    /// Recorded on every build this operator instantiates
    #[serde(default = "field_manager_default")]
    pub actor: String,
    #[serde(default = "build_poll_interval_secs_default")]
    pub build_poll_interval_secs: u64,
    #[serde(default = "transient_backoff_secs_default")]
    pub transient_backoff_secs: u64,
    #[serde(default = "failure_backoff_secs_default")]
    pub failure_backoff_secs: u64,
    #[serde(default = "route_poll_attempts_default")]
    pub route_poll_attempts: u32,
    #[serde(default = "route_poll_interval_ms_default")]
    pub route_poll_interval_ms: u64,
    #[serde(default = "runtimes_default")]
    pub runtimes: HashMap<String, RuntimeImages>,
}

fn concurrency_default() -> u16 {
    4
}

fn field_manager_default() -> String {
    String::from("poddle-operator")
}

fn build_poll_interval_secs_default() -> u64 {
    10
}

fn transient_backoff_secs_default() -> u64 {
    5
}

fn failure_backoff_secs_default() -> u64 {
    30
}

fn route_poll_attempts_default() -> u32 {
    60
}

fn route_poll_interval_ms_default() -> u64 {
    100
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            concurrency: concurrency_default(),
            field_manager: field_manager_default(),
            actor: field_manager_default(),
            build_poll_interval_secs: build_poll_interval_secs_default(),
            transient_backoff_secs: transient_backoff_secs_default(),
            failure_backoff_secs: failure_backoff_secs_default(),
            route_poll_attempts: route_poll_attempts_default(),
            route_poll_interval_ms: route_poll_interval_ms_default(),
            runtimes: runtimes_default(),
        }
    }
}

impl OperatorConfig {
    pub fn build_poll_interval(&self) -> Duration {
        Duration::from_secs(self.build_poll_interval_secs)
    }

    pub fn transient_backoff(&self) -> Duration {
        Duration::from_secs(self.transient_backoff_secs)
    }

    pub fn failure_backoff(&self) -> Duration {
        Duration::from_secs(self.failure_backoff_secs)
    }

    pub fn route_polling(&self) -> RoutePolling {
        RoutePolling {
            attempts: self.route_poll_attempts,
            interval: Duration::from_millis(self.route_poll_interval_ms),
        }
    }
}
