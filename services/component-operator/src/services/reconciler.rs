use std::sync::Arc;
use std::time::{Duration, Instant};

use component_core::conditions::{append_condition, append_failure};
use component_core::crds::{Component, DeploymentBuckets};
use component_core::determiners::determine_deployment_buckets;
use component_core::differ::{Delta, compute_delta};
use component_core::formatters::format_route_url;
use component_core::models::{ConditionType, DeploymentMode};
use component_core::ownership::Owner;
use component_core::resources::{OwnedResource, ResourceKind};
use kube::ResourceExt;
use kube::runtime::controller::Action;
use tracing::{info, warn};

use crate::config::OperatorConfig;
use crate::error::{AppError, ErrorClass};
use crate::metrics::{Metrics, ReconcileOutcome};
use crate::services::build_pipeline::{BuildPipeline, PipelineVerdict, WaitReason};
use crate::services::cluster::Cluster;
use crate::services::generators::Blueprint;
use crate::services::route_resolver::resolve_route_host;

/// Shared by every reconcile; holds no per-component state.
pub struct Context<C: ?Sized> {
    pub cluster: Arc<C>,
    pub config: OperatorConfig,
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Converged, wait for the next event
    Done,
    RequeueAfter(Duration),
    /// Re-observe a write on the next tick
    RequeueNow,
}

impl Outcome {
    pub fn action(self) -> Action {
        match self {
            Outcome::Done => Action::await_change(),
            Outcome::RequeueAfter(delay) => Action::requeue(delay),
            Outcome::RequeueNow => Action::requeue(Duration::ZERO),
        }
    }

    fn metric(self) -> ReconcileOutcome {
        match self {
            Outcome::Done => ReconcileOutcome::Done,
            Outcome::RequeueAfter(_) => ReconcileOutcome::RequeueAfter,
            Outcome::RequeueNow => ReconcileOutcome::RequeueNow,
        }
    }
}

/// Where a tick stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Building,
    WorkloadApplied,
    Converged,
}

pub async fn reconcile<C>(
    component: Arc<Component>,
    ctx: Arc<Context<C>>,
) -> Result<Action, AppError>
where
    C: Cluster + ?Sized,
{
    let started = Instant::now();
    let namespace = component.namespace().unwrap_or_default();
    let name = component.name_any();

    let result = tick(&namespace, &name, &ctx).await;
    let elapsed = started.elapsed();

    match result {
        Ok(outcome) => {
            ctx.metrics.record_reconcile(outcome.metric(), elapsed);
            Ok(outcome.action())
        }
        Err(err) => {
            let class = err.class();
            ctx.metrics.record_failure(class);
            match class {
                ErrorClass::Deleted => {
                    info!("👻 Component {}/{} is gone, nothing to do", namespace, name);
                    ctx.metrics
                        .record_reconcile(ReconcileOutcome::Deleted, elapsed);
                    Ok(Action::await_change())
                }
                ErrorClass::Transient => {
                    ctx.metrics.record_reconcile(ReconcileOutcome::Error, elapsed);
                    Err(err)
                }
                ErrorClass::Domain => {
                    record_failure(ctx.as_ref(), &namespace, &name, &err).await;
                    ctx.metrics.record_reconcile(ReconcileOutcome::Error, elapsed);
                    Err(err)
                }
            }
        }
    }
}

pub fn error_policy<C>(component: Arc<Component>, error: &AppError, ctx: Arc<Context<C>>) -> Action
where
    C: Cluster + ?Sized,
{
    let delay = match error.class() {
        ErrorClass::Domain => ctx.config.failure_backoff(),
        ErrorClass::Transient | ErrorClass::Deleted => ctx.config.transient_backoff(),
    };
    warn!(
        "🔁 Component {} requeued in {:?}: {}",
        component.name_any(),
        delay,
        error
    );
    Action::requeue(delay)
}

#[tracing::instrument(
    name = "reconciler.tick",
    skip_all,
    fields(namespace = %namespace, component = %name),
    err
)]
async fn tick<C>(namespace: &str, name: &str, ctx: &Context<C>) -> Result<Outcome, AppError>
where
    C: Cluster + ?Sized,
{
    // Always decide from what the cluster holds now, not from the event payload
    let Some(observed) = ctx.cluster.fetch_component(namespace, name).await? else {
        return Err(AppError::ComponentNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    };

    let mut working = observed.clone();
    let step = drive(&mut working, ctx).await?;
    settle(ctx, &observed, working, step).await
}

/// Brings every child in line with the component and reports how far it got.
async fn drive<C>(working: &mut Component, ctx: &Context<C>) -> Result<Step, AppError>
where
    C: Cluster + ?Sized,
{
    let cluster = ctx.cluster.as_ref();
    let owner = Owner::of(&*working)?;

    let runtime = ctx
        .config
        .runtimes
        .get(&working.spec.runtime)
        .cloned()
        .ok_or_else(|| AppError::UnknownRuntime(working.spec.runtime.clone()))?;

    if working.spec.mode == DeploymentMode::Build && working.spec.git().is_none() {
        return Err(AppError::MissingSource(owner.name.clone()));
    }

    if working.spec.version.is_none() {
        working.spec.version = Some(runtime.default_version.clone());
    }

    let status = working.status.get_or_insert_with(Default::default);
    status.deployments = observe_buckets(cluster, &owner).await?;

    let blueprint = Blueprint::new(&owner, &working.spec, &runtime);

    let image = match working.spec.mode {
        DeploymentMode::Dev => blueprint.runtime_base_image(),
        DeploymentMode::Build => {
            let builder = blueprint.builder_build_config()?;
            let runtime_stage = blueprint.runtime_build_config();

            ensure(cluster, blueprint.image_stream().into()).await?;
            ensure(cluster, builder.clone().into()).await?;
            ensure(cluster, runtime_stage.clone().into()).await?;

            let verdict = BuildPipeline {
                cluster,
                component: &owner.name,
                builder: &builder,
                runtime: &runtime_stage,
                actor: &ctx.config.actor,
                image_change_trigger: working.spec.image_change_trigger(),
            }
            .advance()
            .await?;

            match verdict {
                PipelineVerdict::Ready { image } => image,
                PipelineVerdict::Waiting { reason, .. } => {
                    if let WaitReason::BuildTriggered(_) = reason {
                        ctx.metrics.record_build_triggered();
                    }
                    return Ok(Step::Building);
                }
            }
        }
    };

    ensure(cluster, blueprint.service().into()).await?;
    if ensure(cluster, blueprint.deployment(&image).into()).await? {
        return Ok(Step::WorkloadApplied);
    }

    if working.spec.expose_service {
        ensure(cluster, blueprint.route().into()).await?;
        let host = resolve_route_host(
            cluster,
            &owner.namespace,
            &owner.name,
            ctx.config.route_polling(),
        )
        .await?;
        // an unresolved host keeps the last known URL
        if !host.is_empty() {
            status.route = format_route_url(&host);
        }
    } else {
        cluster
            .delete(ResourceKind::Route, &owner.namespace, &owner.name)
            .await?;
        status.route.clear();
    }

    Ok(Step::Converged)
}

/// Creates the child when missing or updates it when managed fields drifted.
/// Returns whether anything was written.
async fn ensure<C>(cluster: &C, desired: OwnedResource) -> Result<bool, AppError>
where
    C: Cluster + ?Sized,
{
    let live = cluster
        .fetch(desired.kind(), desired.namespace(), desired.name())
        .await?;

    match live {
        None => {
            cluster.create(&desired).await?;
            Ok(true)
        }
        Some(live) => match compute_delta(&live, &desired)? {
            Delta::Unchanged => Ok(false),
            Delta::Drifted(patched) => {
                cluster.update(&patched).await?;
                Ok(true)
            }
        },
    }
}

async fn observe_buckets<C>(cluster: &C, owner: &Owner) -> Result<DeploymentBuckets, AppError>
where
    C: Cluster + ?Sized,
{
    let live = cluster
        .fetch(ResourceKind::Deployment, &owner.namespace, &owner.name)
        .await?;

    let workloads = match live {
        Some(OwnedResource::Deployment(deployment)) => {
            let desired = deployment
                .spec
                .as_ref()
                .and_then(|spec| spec.replicas)
                .unwrap_or(1);
            let ready = deployment
                .status
                .as_ref()
                .and_then(|status| status.ready_replicas)
                .unwrap_or(0);
            vec![(owner.name.as_str(), desired, ready)]
        }
        _ => Vec::new(),
    };

    Ok(determine_deployment_buckets(workloads))
}

/// Maps a step onto the ledger and decides whether the component must be written.
async fn settle<C>(
    ctx: &Context<C>,
    observed: &Component,
    mut working: Component,
    step: Step,
) -> Result<Outcome, AppError>
where
    C: Cluster + ?Sized,
{
    let cluster = ctx.cluster.as_ref();

    match step {
        Step::Building | Step::WorkloadApplied => {
            append_condition(conditions_mut(&mut working), ConditionType::Provisioning);
            persist(cluster, observed, &mut working).await?;

            if step == Step::Building {
                Ok(Outcome::RequeueAfter(ctx.config.build_poll_interval()))
            } else {
                Ok(Outcome::RequeueNow)
            }
        }
        Step::Converged => {
            if diverged(observed, &working) {
                persist(cluster, observed, &mut working).await?;
                return Ok(Outcome::RequeueNow);
            }

            if append_condition(conditions_mut(&mut working), ConditionType::Deployed) {
                cluster.replace_component_status(&working).await?;
                info!("🚀 Component {} deployed", working.name_any());
            }
            Ok(Outcome::Done)
        }
    }
}

fn conditions_mut(component: &mut Component) -> &mut Vec<component_core::crds::Condition> {
    &mut component
        .status
        .get_or_insert_with(Default::default)
        .conditions
}

fn diverged(observed: &Component, working: &Component) -> bool {
    observed.spec != working.spec || observed.status != working.status
}

/// Writes the component first when its spec changed, then the status against the new version.
async fn persist<C>(
    cluster: &C,
    observed: &Component,
    working: &mut Component,
) -> Result<(), AppError>
where
    C: Cluster + ?Sized,
{
    if observed.spec != working.spec {
        let replaced = cluster.replace_component(working).await?;
        working.metadata.resource_version = replaced.metadata.resource_version;
    }

    if observed.status != working.status {
        cluster.replace_component_status(working).await?;
    }
    Ok(())
}

/// Best effort: the error is surfaced for backoff whether or not this write lands.
async fn record_failure<C>(ctx: &Context<C>, namespace: &str, name: &str, err: &AppError)
where
    C: Cluster + ?Sized,
{
    let write = async {
        let Some(mut component) = ctx.cluster.fetch_component(namespace, name).await? else {
            return Ok(());
        };
        if append_failure(conditions_mut(&mut component), err.reason(), &err.to_string()) {
            ctx.cluster.replace_component_status(&component).await?;
        }
        Ok::<(), AppError>(())
    };

    match write.await {
        Ok(()) => warn!("❌ Component {}/{} failed: {}", namespace, name, err),
        Err(write_err) => warn!(
            "⚠️ Could not record failure on {}/{}: {}",
            namespace, name, write_err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{FakeCluster, sample_component, sample_spec};
    use component_core::crds::ComponentSpec;
    use component_core::models::BuildPhase;

    const BUILD_POLL: Duration = Duration::from_secs(10);

    fn context(cluster: &Arc<FakeCluster>) -> Arc<Context<FakeCluster>> {
        let config = OperatorConfig {
            route_poll_attempts: 3,
            route_poll_interval_ms: 1,
            ..Default::default()
        };
        Arc::new(Context {
            cluster: cluster.clone(),
            config,
            metrics: Arc::new(Metrics::default()),
        })
    }

    async fn run(
        cluster: &Arc<FakeCluster>,
        ctx: &Arc<Context<FakeCluster>>,
    ) -> Result<Action, AppError> {
        let component = cluster
            .component("acme", "shop")
            .unwrap_or_else(|| sample_component("shop", ComponentSpec::default()));
        reconcile(Arc::new(component), ctx.clone()).await
    }

    /// Reconciles until the driver reports convergence
    async fn run_until_done(cluster: &Arc<FakeCluster>, ctx: &Arc<Context<FakeCluster>>) {
        for _ in 0..6 {
            if run(cluster, ctx).await.unwrap() == Action::await_change() {
                return;
            }
        }
        panic!("component never converged");
    }

    fn condition_types(cluster: &FakeCluster) -> Vec<ConditionType> {
        cluster
            .component("acme", "shop")
            .and_then(|component| component.status)
            .map(|status| status.conditions.iter().map(|c| c.r#type).collect())
            .unwrap_or_default()
    }

    fn deployed_image(cluster: &FakeCluster) -> Option<String> {
        match cluster.resource(ResourceKind::Deployment, "acme", "shop")? {
            OwnedResource::Deployment(deployment) => {
                deployment.spec?.template.spec?.containers[0].image.clone()
            }
            _ => None,
        }
    }

    #[tokio::test]
    async fn happy_path_builds_then_deploys() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_component(sample_component("shop", sample_spec()));
        let ctx = context(&cluster);

        // builder stage has nothing yet, so a run is started
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert_eq!(cluster.instantiations(), 1);
        assert_eq!(condition_types(&cluster), vec![ConditionType::Provisioning]);
        let component = cluster.component("acme", "shop").unwrap();
        assert_eq!(component.spec.version.as_deref(), Some("1"));
        for (kind, name) in [
            (ResourceKind::ImageStream, "shop"),
            (ResourceKind::BuildConfig, "shop-builder"),
            (ResourceKind::BuildConfig, "shop-runtime"),
        ] {
            assert!(cluster.resource(kind, "acme", name).is_some(), "{kind} {name}");
        }

        // run in flight, no second trigger
        cluster.set_build_phase("shop-builder-1", BuildPhase::Running);
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert_eq!(cluster.instantiations(), 1);

        // builder done, runtime stage rebuilds on its image-change trigger
        cluster.set_build_phase("shop-builder-1", BuildPhase::Complete);
        cluster.publish("acme", "shop:builder", "registry/acme/shop@sha256:b1");
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert_eq!(cluster.instantiations(), 1);

        // runtime image published, workload gets applied
        cluster.publish("acme", "shop:latest", "registry/acme/shop@sha256:r1");
        assert_eq!(
            run(&cluster, &ctx).await.unwrap(),
            Action::requeue(Duration::ZERO)
        );
        assert_eq!(
            deployed_image(&cluster).as_deref(),
            Some("registry/acme/shop@sha256:r1")
        );
        assert!(cluster.resource(ResourceKind::Service, "acme", "shop").is_some());

        run_until_done(&cluster, &ctx).await;
        assert_eq!(
            condition_types(&cluster),
            vec![ConditionType::Provisioning, ConditionType::Deployed]
        );
        let status = cluster.component("acme", "shop").unwrap().status.unwrap();
        assert_eq!(status.deployments.starting, vec!["shop"]);

        // converged ticks write nothing
        let version = cluster.component("acme", "shop").unwrap().metadata.resource_version;
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::await_change());
        assert_eq!(
            cluster.component("acme", "shop").unwrap().metadata.resource_version,
            version
        );
    }

    #[tokio::test]
    async fn new_runtime_image_rolls_out() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.insert_component(sample_component("shop", sample_spec()));
        cluster.publish("acme", "shop:latest", "registry/acme/shop@sha256:r1");
        let ctx = context(&cluster);
        run_until_done(&cluster, &ctx).await;

        cluster.publish("acme", "shop:latest", "registry/acme/shop@sha256:r2");
        assert_eq!(
            run(&cluster, &ctx).await.unwrap(),
            Action::requeue(Duration::ZERO)
        );
        assert_eq!(
            deployed_image(&cluster).as_deref(),
            Some("registry/acme/shop@sha256:r2")
        );
        assert_eq!(
            condition_types(&cluster),
            vec![
                ConditionType::Provisioning,
                ConditionType::Deployed,
                ConditionType::Provisioning
            ]
        );
    }

    fn runtime_triggers(cluster: &FakeCluster) -> Vec<String> {
        match cluster.resource(ResourceKind::BuildConfig, "acme", "shop-runtime") {
            Some(OwnedResource::BuildConfig(build_config)) => build_config
                .spec
                .triggers
                .into_iter()
                .map(|trigger| trigger.r#type)
                .collect(),
            _ => Vec::new(),
        }
    }

    #[tokio::test]
    async fn image_change_trigger_follows_the_component() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        if let Some(build) = spec.build.as_mut() {
            build.image_change_trigger = false;
        }
        cluster.insert_component(sample_component("shop", spec));
        let ctx = context(&cluster);

        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert!(runtime_triggers(&cluster).is_empty());

        // switched on, the platform takes over the runtime stage
        cluster.edit_component("acme", "shop", |component| {
            if let Some(build) = component.spec.build.as_mut() {
                build.image_change_trigger = true;
            }
        });
        run(&cluster, &ctx).await.unwrap();
        assert_eq!(runtime_triggers(&cluster), vec!["ImageChange"]);

        cluster.set_build_phase("shop-builder-1", BuildPhase::Complete);
        cluster.publish("acme", "shop:builder", "registry/acme/shop@sha256:b1");
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert_eq!(cluster.instantiations(), 1);

        // switched off, the trigger is removed and the driver starts the runtime run
        cluster.edit_component("acme", "shop", |component| {
            if let Some(build) = component.spec.build.as_mut() {
                build.image_change_trigger = false;
            }
        });
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert!(runtime_triggers(&cluster).is_empty());
        assert_eq!(cluster.instantiations(), 2);
    }

    #[tokio::test]
    async fn missing_source_is_recorded_and_retried() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.build = None;
        cluster.insert_component(sample_component("shop", spec));
        let ctx = context(&cluster);

        let err = run(&cluster, &ctx).await.unwrap_err();
        assert!(matches!(err, AppError::MissingSource(_)));

        let component = cluster.component("acme", "shop").unwrap();
        let conditions = component.status.unwrap().conditions;
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].r#type, ConditionType::Failed);
        assert_eq!(conditions[0].reason.as_deref(), Some("MissingSource"));

        let action = error_policy(
            Arc::new(cluster.component("acme", "shop").unwrap()),
            &err,
            ctx.clone(),
        );
        assert_eq!(action, Action::requeue(Duration::from_secs(30)));

        // retried, still a single entry
        run(&cluster, &ctx).await.unwrap_err();
        assert_eq!(condition_types(&cluster), vec![ConditionType::Failed]);
        assert_eq!(cluster.instantiations(), 0);
    }

    #[tokio::test]
    async fn unknown_runtime_is_a_domain_failure() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.runtime = "cobol".to_string();
        cluster.insert_component(sample_component("shop", spec));
        let ctx = context(&cluster);

        let err = run(&cluster, &ctx).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Domain);

        let component = cluster.component("acme", "shop").unwrap();
        let conditions = component.status.unwrap().conditions;
        assert_eq!(conditions[0].reason.as_deref(), Some("UnknownRuntime"));
    }

    #[tokio::test]
    async fn fixed_component_recovers_from_failure() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.build = None;
        cluster.insert_component(sample_component("shop", spec));
        let ctx = context(&cluster);
        run(&cluster, &ctx).await.unwrap_err();

        cluster.edit_component("acme", "shop", |component| {
            component.spec.build = sample_spec().build;
        });
        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::requeue(BUILD_POLL));
        assert_eq!(
            condition_types(&cluster),
            vec![ConditionType::Failed, ConditionType::Provisioning]
        );
    }

    #[tokio::test]
    async fn deleted_component_ends_cleanly() {
        let cluster = Arc::new(FakeCluster::new());
        let ctx = context(&cluster);

        assert_eq!(run(&cluster, &ctx).await.unwrap(), Action::await_change());
        assert!(cluster.resource(ResourceKind::Deployment, "acme", "shop").is_none());
    }

    #[tokio::test]
    async fn transient_errors_are_not_recorded() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.mode = DeploymentMode::Dev;
        cluster.insert_component(sample_component("shop", spec));
        cluster.fail_writes(true);
        let ctx = context(&cluster);

        let err = run(&cluster, &ctx).await.unwrap_err();
        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(condition_types(&cluster).is_empty());

        let action = error_policy(
            Arc::new(cluster.component("acme", "shop").unwrap()),
            &err,
            ctx.clone(),
        );
        assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn dev_mode_skips_the_pipeline() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.mode = DeploymentMode::Dev;
        spec.build = None;
        cluster.insert_component(sample_component("shop", spec));
        let ctx = context(&cluster);

        run_until_done(&cluster, &ctx).await;

        assert_eq!(cluster.instantiations(), 0);
        assert!(cluster.resource(ResourceKind::BuildConfig, "acme", "shop-builder").is_none());
        assert_eq!(
            deployed_image(&cluster).as_deref(),
            Some("registry.access.redhat.com/ubi8/nodejs-20-minimal:1")
        );
        assert_eq!(
            condition_types(&cluster),
            vec![ConditionType::Provisioning, ConditionType::Deployed]
        );
    }

    #[tokio::test]
    async fn exposed_service_gets_a_route() {
        let cluster = Arc::new(FakeCluster::new());
        let mut spec = sample_spec();
        spec.mode = DeploymentMode::Dev;
        spec.expose_service = true;
        cluster.insert_component(sample_component("shop", spec));
        cluster.assign_route_host_after("shop-acme.apps.example.com", 2);
        let ctx = context(&cluster);

        run_until_done(&cluster, &ctx).await;
        let status = cluster.component("acme", "shop").unwrap().status.unwrap();
        assert_eq!(status.route, "http://shop-acme.apps.example.com");

        cluster.edit_component("acme", "shop", |component| {
            component.spec.expose_service = false;
        });
        run_until_done(&cluster, &ctx).await;

        assert!(cluster.resource(ResourceKind::Route, "acme", "shop").is_none());
        let status = cluster.component("acme", "shop").unwrap().status.unwrap();
        assert!(status.route.is_empty());
    }
}
