use std::collections::BTreeMap;

use component_core::configs::RuntimeImages;
use component_core::crds::{
    BuildConfig, BuildConfigSource, BuildConfigSpec, BuildOutput, BuildStrategy,
    BuildTriggerPolicy, ComponentSpec, GitBuildSource, ImageChangeTrigger, ImageLookupPolicy,
    ImageSource, ImageSourcePath, ImageStream, ImageStreamSpec, Route, RoutePort, RouteSpec,
    RouteTargetReference, SourceBuildStrategy, TagReference,
};
use component_core::formatters::{
    format_build_config_name, format_image_stream_name, format_resource_requirements,
    format_runtime_image, format_stage_output,
};
use component_core::labels::{build_labels, component_labels, selector_labels};
use component_core::models::{BuildStage, EnvEntry};
use component_core::ownership::Owner;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;

use crate::error::AppError;

const HTTP_PORT_NAME: &str = "http";

/// Desired children of one component, regenerated in full on every tick.
pub struct Blueprint<'a> {
    pub owner: &'a Owner,
    pub spec: &'a ComponentSpec,
    pub runtime: &'a RuntimeImages,
}

impl<'a> Blueprint<'a> {
    pub fn new(owner: &'a Owner, spec: &'a ComponentSpec, runtime: &'a RuntimeImages) -> Self {
        Self {
            owner,
            spec,
            runtime,
        }
    }

    fn name(&self) -> &str {
        &self.owner.name
    }

    fn version(&self) -> &str {
        self.spec
            .version
            .as_deref()
            .unwrap_or(&self.runtime.default_version)
    }

    fn metadata(&self, name: String, labels: BTreeMap<String, String>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace: Some(self.owner.namespace.clone()),
            labels: Some(labels),
            owner_references: Some(vec![self.owner.owner_reference()]),
            ..Default::default()
        }
    }

    fn labels(&self) -> BTreeMap<String, String> {
        component_labels(self.name(), &self.spec.runtime, &self.spec.labels)
    }

    /// Catalog runtime image, deployed as-is in dev mode
    pub fn runtime_base_image(&self) -> String {
        format_runtime_image(&self.runtime.runtime_image, self.version())
    }

    pub fn image_stream(&self) -> ImageStream {
        ImageStream {
            metadata: self.metadata(format_image_stream_name(self.name()), self.labels()),
            spec: ImageStreamSpec {
                lookup_policy: Some(ImageLookupPolicy { local: true }),
            },
            status: None,
        }
    }

    /// Source to builder image stage. Fails when the component has no git source.
    pub fn builder_build_config(&self) -> Result<BuildConfig, AppError> {
        let git = self
            .spec
            .git()
            .ok_or_else(|| AppError::MissingSource(self.name().to_string()))?;
        let build = self.spec.build.as_ref();

        let spec = BuildConfigSpec {
            triggers: Vec::new(),
            run_policy: Some("Serial".to_string()),
            source: BuildConfigSource {
                r#type: "Git".to_string(),
                git: Some(GitBuildSource {
                    uri: git.url.clone(),
                    reference: git.reference.clone(),
                }),
                context_dir: git.context_dir.clone(),
                images: Vec::new(),
            },
            strategy: BuildStrategy {
                r#type: "Source".to_string(),
                source_strategy: Some(SourceBuildStrategy {
                    from: TagReference::docker_image(format_runtime_image(
                        &self.runtime.builder_image,
                        self.version(),
                    )),
                    env: build.map(|b| env_vars(&b.env)).unwrap_or_default(),
                    incremental: Some(build.map(|b| b.incremental).unwrap_or(false)),
                }),
            },
            output: Some(self.stage_output(BuildStage::Builder)),
            resources: Some(format_resource_requirements(&self.spec.resources)),
        };

        Ok(BuildConfig {
            metadata: self.build_metadata(BuildStage::Builder),
            spec,
            status: None,
        })
    }

    /// Builder image to runtime image stage, copying the built artifacts.
    pub fn runtime_build_config(&self) -> BuildConfig {
        let builder_tag = format_stage_output(self.name(), BuildStage::Builder).to_string();

        let triggers = if self.spec.image_change_trigger() {
            vec![BuildTriggerPolicy {
                r#type: "ImageChange".to_string(),
                image_change: Some(ImageChangeTrigger {
                    from: Some(TagReference::image_stream_tag(builder_tag.clone())),
                }),
            }]
        } else {
            Vec::new()
        };

        let spec = BuildConfigSpec {
            triggers,
            run_policy: Some("Serial".to_string()),
            source: BuildConfigSource {
                r#type: "Image".to_string(),
                git: None,
                context_dir: None,
                images: vec![ImageSource {
                    from: TagReference::image_stream_tag(builder_tag),
                    paths: vec![ImageSourcePath {
                        source_path: self.runtime.artifact_path.clone(),
                        destination_dir: ".".to_string(),
                    }],
                }],
            },
            strategy: BuildStrategy {
                r#type: "Source".to_string(),
                source_strategy: Some(SourceBuildStrategy {
                    from: TagReference::docker_image(self.runtime_base_image()),
                    env: Vec::new(),
                    incremental: None,
                }),
            },
            output: Some(self.stage_output(BuildStage::Runtime)),
            resources: Some(format_resource_requirements(&self.spec.resources)),
        };

        BuildConfig {
            metadata: self.build_metadata(BuildStage::Runtime),
            spec,
            status: None,
        }
    }

    fn build_metadata(&self, stage: BuildStage) -> ObjectMeta {
        self.metadata(
            format_build_config_name(self.name(), stage),
            build_labels(self.name(), &self.spec.runtime, stage),
        )
    }

    fn stage_output(&self, stage: BuildStage) -> BuildOutput {
        BuildOutput {
            to: Some(TagReference::image_stream_tag(
                format_stage_output(self.name(), stage).to_string(),
            )),
        }
    }

    pub fn deployment(&self, image: &str) -> Deployment {
        let container = Container {
            name: self.name().to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("IfNotPresent".to_string()),
            ports: Some(vec![ContainerPort {
                name: Some(HTTP_PORT_NAME.to_string()),
                container_port: self.spec.port,
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            env: Some(env_vars(&self.spec.env)),
            resources: Some(format_resource_requirements(&self.spec.resources)),
            ..Default::default()
        };

        Deployment {
            metadata: self.metadata(self.name().to_string(), self.labels()),
            spec: Some(DeploymentSpec {
                replicas: Some(self.spec.replicas),
                selector: LabelSelector {
                    match_labels: Some(selector_labels(self.name())),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        // carries the selector labels
                        labels: Some(self.labels()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn service(&self) -> Service {
        Service {
            metadata: self.metadata(self.name().to_string(), self.labels()),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(selector_labels(self.name())),
                ports: Some(vec![ServicePort {
                    name: Some(HTTP_PORT_NAME.to_string()),
                    port: self.spec.port,
                    target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_string())),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn route(&self) -> Route {
        Route {
            metadata: self.metadata(self.name().to_string(), self.labels()),
            spec: RouteSpec {
                host: String::new(),
                to: RouteTargetReference {
                    kind: "Service".to_string(),
                    name: self.name().to_string(),
                    weight: Some(100),
                },
                port: Some(RoutePort {
                    target_port: IntOrString::String(HTTP_PORT_NAME.to_string()),
                }),
            },
            status: None,
        }
    }
}

fn env_vars(entries: &[EnvEntry]) -> Vec<EnvVar> {
    entries
        .iter()
        .map(|entry| EnvVar {
            name: entry.name.clone(),
            value: Some(entry.value.clone()),
            ..Default::default()
        })
        .collect()
}
