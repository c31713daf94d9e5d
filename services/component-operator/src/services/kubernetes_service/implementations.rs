use std::fmt::Debug;

use async_trait::async_trait;
use component_core::crds::{Build, BuildConfig, BuildRequest, Component, ImageStream, Route};
use component_core::models::ImageReference;
use component_core::resources::{OwnedResource, ResourceKind};
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    Api, Resource, ResourceExt,
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

use crate::error::AppError;
use crate::services::cluster::Cluster;
use crate::services::kubernetes_service::KubernetesService;

/// Maps API failures for one object onto the operator's error taxonomy.
fn classify(err: kube::Error, kind: &str, namespace: &str, name: &str) -> AppError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => AppError::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ae) if ae.code == 409 => AppError::Conflict {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        err => AppError::KubeError(err),
    }
}

fn component_missing(err: AppError) -> AppError {
    match err {
        AppError::NotFound {
            namespace, name, ..
        } => AppError::ComponentNotFound { namespace, name },
        err => err,
    }
}

impl KubernetesService {
    fn post_params(&self) -> PostParams {
        PostParams {
            field_manager: Some(self.cfg.field_manager.clone()),
            ..Default::default()
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, AppError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|err| classify(err, &K::kind(&()), namespace, name))
    }

    async fn create_one<K>(&self, resource: &K) -> Result<K, AppError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let created = self
            .api::<K>(&namespace)
            .create(&self.post_params(), resource)
            .await
            .map_err(|err| classify(err, &K::kind(&()), &namespace, &name))?;

        info!("✨ {} {}/{} created", K::kind(&()), namespace, name);
        Ok(created)
    }

    async fn replace_one<K>(&self, resource: &K) -> Result<K, AppError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let namespace = resource.namespace().unwrap_or_default();
        let name = resource.name_any();
        let replaced = self
            .api::<K>(&namespace)
            .replace(&name, &self.post_params(), resource)
            .await
            .map_err(|err| classify(err, &K::kind(&()), &namespace, &name))?;

        info!("🔄 {} {}/{} updated", K::kind(&()), namespace, name);
        Ok(replaced)
    }

    async fn delete_one<K>(&self, namespace: &str, name: &str) -> Result<(), AppError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => {
                info!("🗑️ {} {}/{} deleted", K::kind(&()), namespace, name);
                Ok(())
            }
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(err) => Err(classify(err, &K::kind(&()), namespace, name)),
        }
    }
}

#[async_trait]
impl Cluster for KubernetesService {
    async fn fetch_component(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Component>, AppError> {
        self.get_opt::<Component>(namespace, name).await
    }

    #[tracing::instrument(
        name = "kubernetes_service.replace_component",
        skip_all,
        fields(component = %component.name_any()),
        err
    )]
    async fn replace_component(&self, component: &Component) -> Result<Component, AppError> {
        self.replace_one(component).await.map_err(component_missing)
    }

    #[tracing::instrument(
        name = "kubernetes_service.replace_component_status",
        skip_all,
        fields(component = %component.name_any()),
        err
    )]
    async fn replace_component_status(
        &self,
        component: &Component,
    ) -> Result<Component, AppError> {
        let namespace = component.namespace().unwrap_or_default();
        let name = component.name_any();

        // resourceVersion turns the merge patch into an optimistic write
        let patch = json!({
            "metadata": { "resourceVersion": component.resource_version() },
            "status": component.status,
        });
        let params = PatchParams {
            field_manager: Some(self.cfg.field_manager.clone()),
            ..Default::default()
        };

        let patched = self
            .api::<Component>(&namespace)
            .patch_status(&name, &params, &Patch::Merge(&patch))
            .await
            .map_err(|err| classify(err, "Component", &namespace, &name))
            .map_err(component_missing)?;

        debug!("📝 Component {}/{} status written", namespace, name);
        Ok(patched)
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OwnedResource>, AppError> {
        let resource = match kind {
            ResourceKind::BuildConfig => self
                .get_opt::<BuildConfig>(namespace, name)
                .await?
                .map(OwnedResource::from),
            ResourceKind::ImageStream => self
                .get_opt::<ImageStream>(namespace, name)
                .await?
                .map(OwnedResource::from),
            ResourceKind::Deployment => self
                .get_opt::<Deployment>(namespace, name)
                .await?
                .map(OwnedResource::from),
            ResourceKind::Service => self
                .get_opt::<Service>(namespace, name)
                .await?
                .map(OwnedResource::from),
            ResourceKind::Route => self
                .get_opt::<Route>(namespace, name)
                .await?
                .map(OwnedResource::from),
        };
        Ok(resource)
    }

    async fn create(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError> {
        let created = match resource {
            OwnedResource::BuildConfig(r) => self.create_one(r).await?.into(),
            OwnedResource::ImageStream(r) => self.create_one(r).await?.into(),
            OwnedResource::Deployment(r) => self.create_one(r).await?.into(),
            OwnedResource::Service(r) => self.create_one(r).await?.into(),
            OwnedResource::Route(r) => self.create_one(r).await?.into(),
        };
        Ok(created)
    }

    async fn update(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError> {
        let updated = match resource {
            OwnedResource::BuildConfig(r) => self.replace_one(r).await?.into(),
            OwnedResource::ImageStream(r) => self.replace_one(r).await?.into(),
            OwnedResource::Deployment(r) => self.replace_one(r).await?.into(),
            OwnedResource::Service(r) => self.replace_one(r).await?.into(),
            OwnedResource::Route(r) => self.replace_one(r).await?.into(),
        };
        Ok(updated)
    }

    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), AppError> {
        match kind {
            ResourceKind::BuildConfig => self.delete_one::<BuildConfig>(namespace, name).await,
            ResourceKind::ImageStream => self.delete_one::<ImageStream>(namespace, name).await,
            ResourceKind::Deployment => self.delete_one::<Deployment>(namespace, name).await,
            ResourceKind::Service => self.delete_one::<Service>(namespace, name).await,
            ResourceKind::Route => self.delete_one::<Route>(namespace, name).await,
        }
    }

    async fn list_builds(&self, namespace: &str, selector: &str) -> Result<Vec<Build>, AppError> {
        let builds = self
            .api::<Build>(namespace)
            .list(&ListParams::default().labels(selector))
            .await?;
        Ok(builds.items)
    }

    async fn published_image(
        &self,
        namespace: &str,
        image: &ImageReference,
    ) -> Result<Option<String>, AppError> {
        let stream = self.get_opt::<ImageStream>(namespace, &image.name).await?;
        Ok(stream.and_then(|stream| stream.published_image(&image.tag)))
    }

    #[tracing::instrument(
        name = "kubernetes_service.instantiate_build",
        skip_all,
        fields(build_config = %build_config.name_any()),
        err
    )]
    async fn instantiate_build(
        &self,
        build_config: &BuildConfig,
        actor: &str,
    ) -> Result<String, AppError> {
        let namespace = build_config.namespace().unwrap_or_default();
        let name = build_config.name_any();
        let request = BuildRequest::new(&name, actor);

        let build: Build = self
            .api::<BuildConfig>(&namespace)
            .create_subresource("instantiate", &name, &self.post_params(), &request)
            .await
            .map_err(|err| classify(err, "BuildConfig", &namespace, &name))?;

        Ok(build.name_any())
    }
}
