use async_trait::async_trait;
use component_core::crds::{Build, BuildConfig, Component};
use component_core::models::ImageReference;
use component_core::resources::{OwnedResource, ResourceKind};

use crate::error::AppError;

/// Everything the reconcile engine needs from the cluster. Kept narrow so the
/// engine can run against an in-memory store in tests.
#[async_trait]
pub trait Cluster: Send + Sync {
    async fn fetch_component(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Component>, AppError>;

    /// Full replace guarded by the component's resourceVersion
    async fn replace_component(&self, component: &Component) -> Result<Component, AppError>;

    /// Writes the status subresource guarded by the component's resourceVersion
    async fn replace_component_status(&self, component: &Component)
    -> Result<Component, AppError>;

    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OwnedResource>, AppError>;

    async fn create(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError>;

    async fn update(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError>;

    /// Deleting something already gone succeeds
    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str)
    -> Result<(), AppError>;

    async fn list_builds(&self, namespace: &str, selector: &str) -> Result<Vec<Build>, AppError>;

    /// Pushed image reference for an image stream tag, if one was ever published
    async fn published_image(
        &self,
        namespace: &str,
        image: &ImageReference,
    ) -> Result<Option<String>, AppError>;

    /// Starts a new run of the build config and returns the run's name
    async fn instantiate_build(
        &self,
        build_config: &BuildConfig,
        actor: &str,
    ) -> Result<String, AppError>;
}
