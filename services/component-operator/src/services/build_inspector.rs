use component_core::crds::BuildConfig;
use component_core::models::{BuildState, FailedBuild, ImageReference};
use kube::ResourceExt;
use tracing::debug;

use crate::error::AppError;
use crate::services::cluster::Cluster;

/// Image stream tag a build config pushes to
pub fn output_image(build_config: &BuildConfig) -> Option<ImageReference> {
    build_config
        .spec
        .output
        .as_ref()?
        .to
        .as_ref()
        .filter(|to| to.kind == "ImageStreamTag")
        .and_then(|to| ImageReference::parse(&to.name))
}

/// Snapshot of one build config: a published image wins over any run,
/// otherwise any New, Pending or Running run counts as in progress.
#[tracing::instrument(
    name = "build_inspector.inspect",
    skip_all,
    fields(build_config = %build_config.name_any(), selector = %selector),
    err
)]
pub async fn inspect_build_state<C>(
    cluster: &C,
    build_config: &BuildConfig,
    selector: &str,
) -> Result<BuildState, AppError>
where
    C: Cluster + ?Sized,
{
    let namespace = build_config.namespace().unwrap_or_default();

    if let Some(output) = output_image(build_config)
        && let Some(image) = cluster.published_image(&namespace, &output).await?
    {
        debug!("📦 {} already published as {}", output, image);
        return Ok(BuildState::published(image));
    }

    let builds = cluster.list_builds(&namespace, selector).await?;
    if builds.iter().any(|build| build.phase().is_active()) {
        return Ok(BuildState::running());
    }

    let last_failure = builds
        .iter()
        .filter(|build| build.phase().is_failure())
        .max_by_key(|build| build.number())
        .map(|build| FailedBuild {
            name: build.name_any(),
            phase: build.phase(),
            message: build.status.as_ref().and_then(|status| status.message.clone()),
        });

    Ok(BuildState::idle(last_failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeCluster, sample_build_config};
    use component_core::formatters::format_build_selector;
    use component_core::models::{BuildPhase, BuildStage};

    const SELECTOR: &str = "poddle.io/app=shop,poddle.io/build-type=builder";

    #[tokio::test]
    async fn nothing_exists_yet() {
        let cluster = FakeCluster::new();
        let build_config = sample_build_config("shop", BuildStage::Builder);

        let state = inspect_build_state(&cluster, &build_config, SELECTOR)
            .await
            .unwrap();
        assert_eq!(state, BuildState::idle(None));
    }

    #[tokio::test]
    async fn active_run_reports_running() {
        let cluster = FakeCluster::new();
        let build_config = cluster.seed(sample_build_config("shop", BuildStage::Builder));
        let build = cluster.instantiate(&build_config);
        cluster.set_build_phase(&build, BuildPhase::Pending);

        let state = inspect_build_state(&cluster, &build_config, SELECTOR)
            .await
            .unwrap();
        assert!(state.build_running);
        assert!(!state.image_exists);
    }

    #[tokio::test]
    async fn published_image_wins_over_failed_run() {
        let cluster = FakeCluster::new();
        let build_config = cluster.seed(sample_build_config("shop", BuildStage::Builder));
        let build = cluster.instantiate(&build_config);
        cluster.set_build_phase(&build, BuildPhase::Failed);
        cluster.publish("acme", "shop:builder", "registry/acme/shop@sha256:aa");

        let state = inspect_build_state(&cluster, &build_config, SELECTOR)
            .await
            .unwrap();
        assert_eq!(
            state,
            BuildState::published("registry/acme/shop@sha256:aa".to_string())
        );
    }

    #[tokio::test]
    async fn newest_failure_is_recorded() {
        let cluster = FakeCluster::new();
        let build_config = cluster.seed(sample_build_config("shop", BuildStage::Builder));
        let first = cluster.instantiate(&build_config);
        let second = cluster.instantiate(&build_config);
        cluster.set_build_phase(&first, BuildPhase::Error);
        cluster.set_build_phase(&second, BuildPhase::Failed);

        let state = inspect_build_state(
            &cluster,
            &build_config,
            &format_build_selector("shop", BuildStage::Builder),
        )
        .await
        .unwrap();

        assert!(!state.image_exists);
        assert!(!state.build_running);
        let failure = state.last_failure.unwrap();
        assert_eq!(failure.name, second);
        assert_eq!(failure.phase, BuildPhase::Failed);
    }

    #[tokio::test]
    async fn runs_of_other_stages_are_ignored() {
        let cluster = FakeCluster::new();
        let runtime = cluster.seed(sample_build_config("shop", BuildStage::Runtime));
        cluster.instantiate(&runtime);

        let builder = sample_build_config("shop", BuildStage::Builder);
        let state = inspect_build_state(&cluster, &builder, SELECTOR).await.unwrap();
        assert!(!state.build_running);
    }
}
