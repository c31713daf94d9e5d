use std::fmt::Debug;
use std::sync::Arc;

use component_core::crds::{Build, BuildConfig, Component, ImageStream, Route};
use component_core::labels::{APP, MANAGED_BY, MANAGER};
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::controller::{Action, Config as ControllerConfig, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::services::kubernetes_service::KubernetesService;
use crate::services::reconciler::{Context, error_policy, reconcile};

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    }
}

/// Maps a build run back to the component that owns its build config
fn owning_component(build: Build) -> Option<ObjectRef<Component>> {
    let app = build.labels().get(APP)?.clone();
    let namespace = build.namespace()?;
    Some(ObjectRef::new(&app).within(&namespace))
}

fn log_result<E: Debug>(result: Result<(ObjectRef<Component>, Action), E>) {
    match result {
        Ok((object, action)) => debug!("✅ Reconciled {:?}, next {:?}", object, action),
        Err(err) => warn!("⚠️ Reconcile failed: {:?}", err),
    }
}

/// Runs the component controller until its watch streams end.
pub async fn run_controller(
    client: Client,
    ctx: Arc<Context<KubernetesService>>,
) -> Result<(), AppError> {
    let namespace = ctx.config.watch_namespace.clone();
    let namespace = namespace.as_deref();

    let owned = watcher::Config::default().labels(&format!("{}={}", MANAGED_BY, MANAGER));
    let concurrency = ctx.config.concurrency;

    info!(
        "🔍 Watching components in {}",
        namespace.unwrap_or("all namespaces")
    );

    Controller::new(
        scoped::<Component>(&client, namespace),
        watcher::Config::default(),
    )
    .owns(scoped::<BuildConfig>(&client, namespace), owned.clone())
    .owns(scoped::<ImageStream>(&client, namespace), owned.clone())
    .owns(scoped::<Deployment>(&client, namespace), owned.clone())
    .owns(scoped::<Service>(&client, namespace), owned.clone())
    .owns(scoped::<Route>(&client, namespace), owned.clone())
    // runs are created by the platform, so they carry no owner reference to us
    .watches(scoped::<Build>(&client, namespace), owned, owning_component)
    .with_config(ControllerConfig::default().concurrency(concurrency))
    .run(reconcile, error_policy, ctx)
    .for_each(|result| async move { log_result(result) })
    .await;

    warn!("❌ Component controller stream ended");
    Ok(())
}
