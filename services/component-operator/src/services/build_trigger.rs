use std::panic::AssertUnwindSafe;

use component_core::crds::BuildConfig;
use component_core::models::BuildState;
use component_core::resources::{OwnedResource, ResourceKind};
use futures::FutureExt;
use kube::ResourceExt;
use tracing::{info, warn};

use crate::error::AppError;
use crate::services::cluster::Cluster;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TriggerOutcome {
    pub started: bool,
    pub build_name: String,
}

impl TriggerOutcome {
    fn skipped() -> Self {
        Self::default()
    }

    fn started(build_name: String) -> Self {
        Self {
            started: true,
            build_name,
        }
    }
}

/// Starts a run unless one is already active. The guard is advisory, so the
/// state must come from a fresh inspection on the same tick.
#[tracing::instrument(
    name = "build_trigger.trigger",
    skip_all,
    fields(build_config = %build_config.name_any(), actor = %actor),
    err
)]
pub async fn trigger_build<C>(
    cluster: &C,
    build_config: &BuildConfig,
    state: &BuildState,
    actor: &str,
) -> Result<TriggerOutcome, AppError>
where
    C: Cluster + ?Sized,
{
    if state.build_running {
        return Ok(TriggerOutcome::skipped());
    }

    let namespace = build_config.namespace().unwrap_or_default();
    let name = build_config.name_any();

    let Some(OwnedResource::BuildConfig(live)) = cluster
        .fetch(ResourceKind::BuildConfig, &namespace, &name)
        .await?
    else {
        warn!("⚠️ BuildConfig {}/{} does not exist yet", namespace, name);
        return Ok(TriggerOutcome::skipped());
    };

    // Some clients panic on instantiate instead of returning an error
    match AssertUnwindSafe(cluster.instantiate_build(&live, actor))
        .catch_unwind()
        .await
    {
        Ok(Ok(build_name)) => {
            info!("🏗️ Build {} started for {}/{}", build_name, namespace, name);
            Ok(TriggerOutcome::started(build_name))
        }
        Ok(Err(err)) => Err(err),
        Err(_) => {
            warn!("⚠️ Instantiating {}/{} panicked, treating as not started", namespace, name);
            Ok(TriggerOutcome::skipped())
        }
    }
}
