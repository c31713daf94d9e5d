use std::collections::BTreeMap;

use crate::models::BuildStage;

pub const APP: &str = "poddle.io/app";
pub const BUILD_TYPE: &str = "poddle.io/build-type";
pub const MANAGED_BY: &str = "poddle.io/managed-by";
pub const RUNTIME: &str = "poddle.io/runtime";

pub const MANAGER: &str = "poddle";

/// Labels every child of a component carries; user labels never override them.
pub fn component_labels(
    name: &str,
    runtime: &str,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut labels = extra.clone();
    labels.insert(APP.to_string(), name.to_string());
    labels.insert(RUNTIME.to_string(), runtime.to_string());
    labels.insert(MANAGED_BY.to_string(), MANAGER.to_string());
    labels
}

pub fn build_labels(name: &str, runtime: &str, stage: BuildStage) -> BTreeMap<String, String> {
    let mut labels = component_labels(name, runtime, &BTreeMap::new());
    labels.insert(BUILD_TYPE.to_string(), stage.as_str().to_string());
    labels
}

/// Pod selector shared by the Deployment template and the Service.
pub fn selector_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP.to_string(), name.to_string())])
}
