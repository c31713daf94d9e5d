use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar, ResourceRequirements, Service};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::debug;

use crate::crds::{BuildConfig, Route};
use crate::error::ResourceError;
use crate::resources::OwnedResource;

/// Outcome of comparing a live child with the freshly generated one.
#[derive(Debug, Clone)]
pub enum Delta {
    Unchanged,
    /// Desired object carrying the live identity, ready for an update call
    Drifted(OwnedResource),
}

impl Delta {
    pub fn needs_update(&self) -> bool {
        matches!(self, Self::Drifted(_))
    }
}

/// Compares only the fields the operator manages, so platform defaults and
/// bookkeeping never read as drift.
pub fn compute_delta(
    live: &OwnedResource,
    desired: &OwnedResource,
) -> Result<Delta, ResourceError> {
    let drifted = match (live, desired) {
        (OwnedResource::Deployment(l), OwnedResource::Deployment(d)) => deployment_drifted(l, d),
        (OwnedResource::BuildConfig(l), OwnedResource::BuildConfig(d)) => {
            build_config_drifted(l, d)
        }
        (OwnedResource::Service(l), OwnedResource::Service(d)) => service_drifted(l, d),
        (OwnedResource::Route(l), OwnedResource::Route(d)) => route_drifted(l, d),
        // create-only
        (OwnedResource::ImageStream(_), OwnedResource::ImageStream(_)) => false,
        _ => {
            return Err(ResourceError::KindMismatch {
                live: live.kind(),
                desired: desired.kind(),
            });
        }
    };

    if !drifted {
        return Ok(Delta::Unchanged);
    }

    debug!(
        "🔍 {} {}/{} drifted from desired state",
        live.kind(),
        live.namespace(),
        live.name()
    );

    let mut patched = desired.clone();
    adopt_identity(live, &mut patched)?;
    keep_assigned_fields(live, &mut patched);
    Ok(Delta::Drifted(patched))
}

fn adopt_identity(live: &OwnedResource, patched: &mut OwnedResource) -> Result<(), ResourceError> {
    let source = live.meta();
    let name = source.name.clone().ok_or(ResourceError::MissingMetadata {
        kind: "live resource",
        field: "name",
    })?;

    let target = patched.meta_mut();
    target.name = Some(name);
    target.namespace = source.namespace.clone();
    target.resource_version = source.resource_version.clone();
    Ok(())
}

/// Fields the platform assigns after creation and the generators never set.
fn keep_assigned_fields(live: &OwnedResource, patched: &mut OwnedResource) {
    match (live, patched) {
        (OwnedResource::Route(l), OwnedResource::Route(p)) => {
            p.spec.host = l.spec.host.clone();
        }
        (OwnedResource::Service(l), OwnedResource::Service(p)) => {
            if let (Some(live_spec), Some(spec)) = (l.spec.as_ref(), p.spec.as_mut()) {
                spec.cluster_ip = live_spec.cluster_ip.clone();
                spec.cluster_ips = live_spec.cluster_ips.clone();
            }
        }
        _ => {}
    }
}

// ---------------------------------------------
// PER KIND WHITELISTS
// ---------------------------------------------

fn deployment_drifted(live: &Deployment, desired: &Deployment) -> bool {
    if live.metadata.labels.clone().unwrap_or_default()
        != desired.metadata.labels.clone().unwrap_or_default()
    {
        return true;
    }

    let live_spec = live.spec.as_ref();
    let desired_spec = desired.spec.as_ref();
    if live_spec.and_then(|s| s.replicas) != desired_spec.and_then(|s| s.replicas) {
        return true;
    }

    let live_containers = containers(live);
    let desired_containers = containers(desired);
    if live_containers.len() != desired_containers.len() {
        return true;
    }

    live_containers
        .iter()
        .zip(desired_containers.iter())
        .any(|(l, d)| container_drifted(l, d))
}

fn containers(deployment: &Deployment) -> &[Container] {
    deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.spec.as_ref())
        .map(|pod| pod.containers.as_slice())
        .unwrap_or_default()
}

fn container_drifted(live: &Container, desired: &Container) -> bool {
    live.image != desired.image
        || env_map(live.env.as_deref().unwrap_or_default())
            != env_map(desired.env.as_deref().unwrap_or_default())
        || resources_drifted(live.resources.as_ref(), desired.resources.as_ref())
        || container_ports(live) != container_ports(desired)
}

fn container_ports(container: &Container) -> Vec<(Option<&str>, i32)> {
    container
        .ports
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|port| (port.name.as_deref(), port.container_port))
        .collect()
}

fn build_config_drifted(live: &BuildConfig, desired: &BuildConfig) -> bool {
    let live_from = live.spec.strategy.source_strategy.as_ref().map(|s| &s.from);
    let desired_from = desired
        .spec
        .strategy
        .source_strategy
        .as_ref()
        .map(|s| &s.from);

    live.spec.source != desired.spec.source
        || live.spec.triggers != desired.spec.triggers
        || live_from != desired_from
        || env_map(live.spec.strategy.env()) != env_map(desired.spec.strategy.env())
        || resources_drifted(live.spec.resources.as_ref(), desired.spec.resources.as_ref())
}

fn service_drifted(live: &Service, desired: &Service) -> bool {
    let live_spec = live.spec.clone().unwrap_or_default();
    let desired_spec = desired.spec.clone().unwrap_or_default();

    let ports = |spec: &k8s_openapi::api::core::v1::ServiceSpec| {
        spec.ports
            .clone()
            .unwrap_or_default()
            .into_iter()
            .map(|port| (port.name, port.port, port.target_port))
            .collect::<Vec<_>>()
    };

    ports(&live_spec) != ports(&desired_spec)
        || live_spec.selector.unwrap_or_default() != desired_spec.selector.unwrap_or_default()
}

fn route_drifted(live: &Route, desired: &Route) -> bool {
    live.spec.to != desired.spec.to || live.spec.port != desired.spec.port
}

/// Two env lists are equal when they induce the same name to value map.
fn env_map(env: &[EnvVar]) -> BTreeMap<&str, &str> {
    env.iter()
        .map(|var| (var.name.as_str(), var.value.as_deref().unwrap_or_default()))
        .collect()
}

fn resources_drifted(
    live: Option<&ResourceRequirements>,
    desired: Option<&ResourceRequirements>,
) -> bool {
    fn quantities(
        requirements: Option<&ResourceRequirements>,
    ) -> (BTreeMap<String, Quantity>, BTreeMap<String, Quantity>) {
        let requirements = requirements.cloned().unwrap_or_default();
        (
            requirements.requests.unwrap_or_default(),
            requirements.limits.unwrap_or_default(),
        )
    }

    quantities(live) != quantities(desired)
}
