//! In-memory cluster used by the engine tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use component_core::configs::runtimes_default;
use component_core::crds::{
    Build, BuildConfig, BuildSource, BuildSpec, BuildStatus, Component, ComponentSpec, GitSource,
    Route,
};
use component_core::models::{BuildPhase, BuildStage, EnvEntry, ImageReference};
use component_core::ownership::Owner;
use component_core::resources::{OwnedResource, ResourceKind};
use kube::{Resource, ResourceExt};

use crate::error::AppError;
use crate::services::cluster::Cluster;
use crate::services::generators::Blueprint;

const NAMESPACE: &str = "acme";

type ResourceKey = (ResourceKind, String, String);

#[derive(Default)]
struct State {
    components: HashMap<(String, String), Component>,
    resources: HashMap<ResourceKey, OwnedResource>,
    builds: Vec<Build>,
    build_counters: HashMap<String, u64>,
    published: HashMap<(String, String), String>,
    fetches: HashMap<ResourceKind, u32>,
    route_host: Option<(String, u32)>,
    route_fetches: u32,
    revision: u64,
}

impl State {
    fn next_revision(&mut self) -> String {
        self.revision += 1;
        self.revision.to_string()
    }

    fn start_build(&mut self, build_config: &BuildConfig) -> String {
        let config_name = build_config.name_any();
        let counter = self.build_counters.entry(config_name.clone()).or_default();
        *counter += 1;
        let number = *counter;

        let name = format!("{}-{}", config_name, number);
        let mut build = Build::new(&name, BuildSpec::default());
        build.metadata.namespace = build_config.namespace();
        build.metadata.labels = build_config.metadata.labels.clone();
        build.metadata.annotations = Some(BTreeMap::from([(
            "openshift.io/build.number".to_string(),
            number.to_string(),
        )]));
        build.status = Some(BuildStatus {
            phase: BuildPhase::New,
            ..Default::default()
        });
        self.builds.push(build);
        name
    }

    /// The platform fills the host in some time after the route exists
    fn observe_route(&mut self, key: &ResourceKey) {
        let Some((host, after)) = self.route_host.clone() else {
            return;
        };
        let Some(OwnedResource::Route(route)) = self.resources.get_mut(key) else {
            return;
        };
        self.route_fetches += 1;
        if self.route_fetches >= after {
            route.spec.host = host;
        }
    }
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
    panic_on_instantiate: AtomicBool,
    fail_writes: AtomicBool,
    instantiations: AtomicU32,
}

fn resource_key(resource: &OwnedResource) -> ResourceKey {
    (
        resource.kind(),
        resource.namespace().to_string(),
        resource.name().to_string(),
    )
}

fn component_key(component: &Component) -> (String, String) {
    (
        component.namespace().unwrap_or_default(),
        component.name_any(),
    )
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn check_writable(&self, kind: &str, namespace: &str, name: &str) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Conflict {
                kind: kind.to_string(),
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn insert_component(&self, mut component: Component) -> Component {
        let mut state = self.lock();
        if component.metadata.namespace.is_none() {
            component.metadata.namespace = Some(NAMESPACE.to_string());
        }
        component.metadata.uid = Some(format!("uid-{}", component.name_any()));
        component.metadata.resource_version = Some(state.next_revision());
        state
            .components
            .insert(component_key(&component), component.clone());
        component
    }

    pub fn component(&self, namespace: &str, name: &str) -> Option<Component> {
        self.lock()
            .components
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Simulates a user edit
    pub fn edit_component(&self, namespace: &str, name: &str, edit: impl FnOnce(&mut Component)) {
        let mut state = self.lock();
        let revision = state.next_revision();
        let component = state
            .components
            .get_mut(&(namespace.to_string(), name.to_string()))
            .unwrap();
        edit(component);
        component.metadata.resource_version = Some(revision);
    }

    pub fn seed<R>(&self, mut resource: R) -> R
    where
        R: Resource + Clone + Into<OwnedResource>,
    {
        let mut state = self.lock();
        resource.meta_mut().resource_version = Some(state.next_revision());
        let owned: OwnedResource = resource.clone().into();
        state.resources.insert(resource_key(&owned), owned);
        resource
    }

    pub fn resource(&self, kind: ResourceKind, namespace: &str, name: &str) -> Option<OwnedResource> {
        self.lock()
            .resources
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Starts a run the way the platform would on its own, e.g. from a trigger
    pub fn instantiate(&self, build_config: &BuildConfig) -> String {
        self.lock().start_build(build_config)
    }

    pub fn set_build_phase(&self, name: &str, phase: BuildPhase) {
        let mut state = self.lock();
        let build = state
            .builds
            .iter_mut()
            .find(|build| build.name_any() == name)
            .unwrap();
        build.status.get_or_insert_with(Default::default).phase = phase;
    }

    pub fn builds(&self) -> Vec<Build> {
        self.lock().builds.clone()
    }

    pub fn publish(&self, namespace: &str, tag: &str, reference: &str) {
        self.lock().published.insert(
            (namespace.to_string(), tag.to_string()),
            reference.to_string(),
        );
    }

    pub fn assign_route_host_after(&self, host: &str, fetches: u32) {
        self.lock().route_host = Some((host.to_string(), fetches));
    }

    pub fn fetches(&self, kind: ResourceKind) -> u32 {
        self.lock().fetches.get(&kind).copied().unwrap_or_default()
    }

    pub fn instantiations(&self) -> u32 {
        self.instantiations.load(Ordering::SeqCst)
    }

    pub fn panic_on_instantiate(&self, enabled: bool) {
        self.panic_on_instantiate.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Cluster for FakeCluster {
    async fn fetch_component(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Component>, AppError> {
        Ok(self.component(namespace, name))
    }

    async fn replace_component(&self, component: &Component) -> Result<Component, AppError> {
        let (namespace, name) = component_key(component);
        self.check_writable("Component", &namespace, &name)?;

        let mut state = self.lock();
        let stored = state
            .components
            .get(&(namespace.clone(), name.clone()))
            .cloned()
            .ok_or_else(|| AppError::ComponentNotFound {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;
        if stored.metadata.resource_version != component.metadata.resource_version {
            return Err(AppError::Conflict {
                kind: "Component".to_string(),
                namespace,
                name,
            });
        }

        let mut next = component.clone();
        next.status = stored.status;
        next.metadata.resource_version = Some(state.next_revision());
        state.components.insert((namespace, name), next.clone());
        Ok(next)
    }

    async fn replace_component_status(
        &self,
        component: &Component,
    ) -> Result<Component, AppError> {
        let (namespace, name) = component_key(component);
        self.check_writable("Component", &namespace, &name)?;

        let mut state = self.lock();
        let mut next = state
            .components
            .get(&(namespace.clone(), name.clone()))
            .cloned()
            .ok_or_else(|| AppError::ComponentNotFound {
                namespace: namespace.clone(),
                name: name.clone(),
            })?;
        if component.metadata.resource_version.is_some()
            && next.metadata.resource_version != component.metadata.resource_version
        {
            return Err(AppError::Conflict {
                kind: "Component".to_string(),
                namespace,
                name,
            });
        }

        next.status = component.status.clone();
        next.metadata.resource_version = Some(state.next_revision());
        state.components.insert((namespace, name), next.clone());
        Ok(next)
    }

    async fn fetch(
        &self,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<OwnedResource>, AppError> {
        let mut state = self.lock();
        *state.fetches.entry(kind).or_default() += 1;

        let key = (kind, namespace.to_string(), name.to_string());
        if kind == ResourceKind::Route {
            state.observe_route(&key);
        }
        Ok(state.resources.get(&key).cloned())
    }

    async fn create(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError> {
        let key = resource_key(resource);
        self.check_writable(&key.0.to_string(), &key.1, &key.2)?;

        let mut state = self.lock();
        if state.resources.contains_key(&key) {
            return Err(AppError::Conflict {
                kind: key.0.to_string(),
                namespace: key.1,
                name: key.2,
            });
        }

        let mut created = resource.clone();
        let revision = state.next_revision();
        let meta = created.meta_mut();
        meta.resource_version = Some(revision);
        meta.uid = Some(format!("uid-{}-{}", key.0, key.2));
        state.resources.insert(key, created.clone());
        Ok(created)
    }

    async fn update(&self, resource: &OwnedResource) -> Result<OwnedResource, AppError> {
        let key = resource_key(resource);
        self.check_writable(&key.0.to_string(), &key.1, &key.2)?;

        let mut state = self.lock();
        let Some(stored) = state.resources.get(&key) else {
            return Err(AppError::NotFound {
                kind: key.0.to_string(),
                namespace: key.1,
                name: key.2,
            });
        };
        if stored.resource_version() != resource.resource_version() {
            return Err(AppError::Conflict {
                kind: key.0.to_string(),
                namespace: key.1,
                name: key.2,
            });
        }

        let mut updated = resource.clone();
        updated.meta_mut().resource_version = Some(state.next_revision());
        state.resources.insert(key, updated.clone());
        Ok(updated)
    }

    async fn delete(&self, kind: ResourceKind, namespace: &str, name: &str) -> Result<(), AppError> {
        self.lock()
            .resources
            .remove(&(kind, namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn list_builds(&self, namespace: &str, selector: &str) -> Result<Vec<Build>, AppError> {
        let wanted: Vec<(&str, &str)> = selector
            .split(',')
            .filter_map(|pair| pair.split_once('='))
            .collect();

        Ok(self
            .lock()
            .builds
            .iter()
            .filter(|build| build.namespace().as_deref() == Some(namespace))
            .filter(|build| {
                let labels = build.labels();
                wanted
                    .iter()
                    .all(|(key, value)| labels.get(*key).map(String::as_str) == Some(*value))
            })
            .cloned()
            .collect())
    }

    async fn published_image(
        &self,
        namespace: &str,
        image: &ImageReference,
    ) -> Result<Option<String>, AppError> {
        Ok(self
            .lock()
            .published
            .get(&(namespace.to_string(), image.to_string()))
            .cloned())
    }

    async fn instantiate_build(
        &self,
        build_config: &BuildConfig,
        _actor: &str,
    ) -> Result<String, AppError> {
        if self.panic_on_instantiate.load(Ordering::SeqCst) {
            panic!("instantiate blew up");
        }
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().start_build(build_config))
    }
}

pub fn sample_spec() -> ComponentSpec {
    ComponentSpec {
        runtime: "nodejs".to_string(),
        build: Some(BuildSource {
            git: Some(GitSource {
                url: "https://github.com/acme/shop".to_string(),
                reference: Some("main".to_string()),
                context_dir: Some("web".to_string()),
            }),
            incremental: false,
            env: vec![EnvEntry::new("NPM_MIRROR", "https://npm.acme.internal")],
            image_change_trigger: true,
        }),
        env: vec![EnvEntry::new("GREETING", "hello")],
        ..Default::default()
    }
}

pub fn sample_component(name: &str, spec: ComponentSpec) -> Component {
    let mut component = Component::new(name, spec);
    component.metadata.namespace = Some(NAMESPACE.to_string());
    component
}

pub fn sample_owner(name: &str) -> Owner {
    Owner {
        api_version: "poddle.io/v1alpha1".to_string(),
        kind: "Component".to_string(),
        name: name.to_string(),
        namespace: NAMESPACE.to_string(),
        uid: format!("uid-{}", name),
    }
}

pub fn sample_build_config(name: &str, stage: BuildStage) -> BuildConfig {
    let owner = sample_owner(name);
    let spec = sample_spec();
    let runtimes = runtimes_default();
    let blueprint = Blueprint::new(&owner, &spec, &runtimes["nodejs"]);

    match stage {
        BuildStage::Builder => blueprint.builder_build_config().unwrap(),
        BuildStage::Runtime => blueprint.runtime_build_config(),
    }
}

pub fn sample_route(name: &str) -> Route {
    let owner = sample_owner(name);
    let spec = sample_spec();
    let runtimes = runtimes_default();
    Blueprint::new(&owner, &spec, &runtimes["nodejs"]).route()
}
