use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{ConditionType, DeploymentMode, EnvEntry, ResourceSpec};

// -----------------------------------------------------------------------------
// Component Resource (the owning resource users declare)
// -----------------------------------------------------------------------------
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[kube(
    group = "poddle.io",
    version = "v1alpha1",
    kind = "Component",
    plural = "components",
    shortname = "comp",
    namespaced,
    status = "ComponentStatus",
    printcolumn = r#"{"name":"Runtime","type":"string","jsonPath":".spec.runtime"}"#,
    printcolumn = r#"{"name":"Mode","type":"string","jsonPath":".spec.mode"}"#,
    printcolumn = r#"{"name":"Route","type":"string","jsonPath":".status.route"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Key into the operator's runtime catalog
    pub runtime: String,
    /// Runtime image version, filled from the catalog when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub mode: DeploymentMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSource>,
    #[serde(default = "replicas_default")]
    pub replicas: i32,
    #[serde(default = "port_default")]
    pub port: i32,
    #[serde(default)]
    pub expose_service: bool,
    #[serde(default)]
    pub env: Vec<EnvEntry>,
    #[serde(default)]
    pub resources: ResourceSpec,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn replicas_default() -> i32 {
    1
}

fn port_default() -> i32 {
    8080
}

impl Default for ComponentSpec {
    fn default() -> Self {
        Self {
            runtime: String::new(),
            version: None,
            mode: DeploymentMode::default(),
            build: None,
            replicas: replicas_default(),
            port: port_default(),
            expose_service: false,
            env: Vec::new(),
            resources: ResourceSpec::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl ComponentSpec {
    pub fn git(&self) -> Option<&GitSource> {
        self.build.as_ref().and_then(|build| build.git.as_ref())
    }

    /// Whether the runtime stage rebuilds on its own when the builder image changes
    pub fn image_change_trigger(&self) -> bool {
        self.build
            .as_ref()
            .map(|build| build.image_change_trigger)
            .unwrap_or(true)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuildSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSource>,
    #[serde(default)]
    pub incremental: bool,
    /// Environment handed to the builder stage only
    #[serde(default)]
    pub env: Vec<EnvEntry>,
    #[serde(default = "image_change_trigger_default")]
    pub image_change_trigger: bool,
}

fn image_change_trigger_default() -> bool {
    true
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitSource {
    pub url: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

// -----------------------------------------------------------------------------
// Status
// -----------------------------------------------------------------------------
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// External URL, empty until the platform assigns a host
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub deployments: DeploymentBuckets,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: ConditionType,
    pub status: String,
    pub last_transition_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Workload names grouped by rollout state
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq, JsonSchema)]
pub struct DeploymentBuckets {
    #[serde(default)]
    pub stopped: Vec<String>,
    #[serde(default)]
    pub starting: Vec<String>,
    #[serde(default)]
    pub ready: Vec<String>,
}
