use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::labels;
use crate::models::{BuildStage, ImageReference, ResourceSpec};

pub fn format_image_stream_name(component: &str) -> String {
    component.to_string()
}

/// generate build config name like `{component}-{stage}`
pub fn format_build_config_name(component: &str, stage: BuildStage) -> String {
    format!("{}-{}", component, stage.as_str())
}

pub fn format_stage_output(component: &str, stage: BuildStage) -> ImageReference {
    ImageReference::new(format_image_stream_name(component), stage.output_tag())
}

/// label selector matching every Build run of one stage
pub fn format_build_selector(component: &str, stage: BuildStage) -> String {
    format!(
        "{}={},{}={}",
        labels::APP,
        component,
        labels::BUILD_TYPE,
        stage.as_str()
    )
}

pub fn format_runtime_image(image: &str, version: &str) -> String {
    format!("{}:{}", image, version)
}

pub fn format_route_url(host: &str) -> String {
    if host.is_empty() {
        return String::new();
    }
    format!("http://{}", host)
}

/// CPU in the form the API server stores it, so `1000m` reads back as `1`
pub fn format_cpu(millicores: i32) -> String {
    if millicores % 1000 == 0 {
        format!("{}", millicores / 1000)
    } else {
        format!("{}m", millicores)
    }
}

/// Memory in the form the API server stores it, reduced to the largest binary
/// suffix so `1024Mi` reads back as `1Gi` and `1048576Mi` as `1Ti`
pub fn format_memory(megabytes: i32) -> String {
    const SUFFIXES: [&str; 5] = ["Mi", "Gi", "Ti", "Pi", "Ei"];

    if megabytes == 0 {
        return "0".to_string();
    }

    let mut value = megabytes;
    let mut suffix = 0;
    while value % 1024 == 0 && suffix + 1 < SUFFIXES.len() {
        value /= 1024;
        suffix += 1;
    }
    format!("{}{}", value, SUFFIXES[suffix])
}

pub fn format_resource_requirements(spec: &ResourceSpec) -> ResourceRequirements {
    let requests = BTreeMap::from([
        (
            "cpu".to_string(),
            Quantity(format_cpu(spec.cpu_request_millicores)),
        ),
        (
            "memory".to_string(),
            Quantity(format_memory(spec.memory_request_mb)),
        ),
    ]);
    let limits = BTreeMap::from([
        (
            "cpu".to_string(),
            Quantity(format_cpu(spec.cpu_limit_millicores)),
        ),
        (
            "memory".to_string(),
            Quantity(format_memory(spec.memory_limit_mb)),
        ),
    ]);

    ResourceRequirements {
        requests: Some(requests),
        limits: Some(limits),
        ..Default::default()
    }
}
