use std::fmt;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::api::ObjectMeta;
use kube::Resource;

use crate::crds::{BuildConfig, ImageStream, Route};

/// Every kind of child a component owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    BuildConfig,
    ImageStream,
    Deployment,
    Service,
    Route,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildConfig => write!(f, "BuildConfig"),
            Self::ImageStream => write!(f, "ImageStream"),
            Self::Deployment => write!(f, "Deployment"),
            Self::Service => write!(f, "Service"),
            Self::Route => write!(f, "Route"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum OwnedResource {
    BuildConfig(BuildConfig),
    ImageStream(ImageStream),
    Deployment(Deployment),
    Service(Service),
    Route(Route),
}

impl OwnedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::BuildConfig(_) => ResourceKind::BuildConfig,
            Self::ImageStream(_) => ResourceKind::ImageStream,
            Self::Deployment(_) => ResourceKind::Deployment,
            Self::Service(_) => ResourceKind::Service,
            Self::Route(_) => ResourceKind::Route,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::BuildConfig(r) => r.meta(),
            Self::ImageStream(r) => r.meta(),
            Self::Deployment(r) => r.meta(),
            Self::Service(r) => r.meta(),
            Self::Route(r) => r.meta(),
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::BuildConfig(r) => r.meta_mut(),
            Self::ImageStream(r) => r.meta_mut(),
            Self::Deployment(r) => r.meta_mut(),
            Self::Service(r) => r.meta_mut(),
            Self::Route(r) => r.meta_mut(),
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }
}

impl From<BuildConfig> for OwnedResource {
    fn from(value: BuildConfig) -> Self {
        Self::BuildConfig(value)
    }
}

impl From<ImageStream> for OwnedResource {
    fn from(value: ImageStream) -> Self {
        Self::ImageStream(value)
    }
}

impl From<Deployment> for OwnedResource {
    fn from(value: Deployment) -> Self {
        Self::Deployment(value)
    }
}

impl From<Service> for OwnedResource {
    fn from(value: Service) -> Self {
        Self::Service(value)
    }
}

impl From<Route> for OwnedResource {
    fn from(value: Route) -> Self {
        Self::Route(value)
    }
}
