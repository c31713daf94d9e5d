use std::collections::HashMap;

use serde::Deserialize;

/// Base images used to build and run one runtime
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct RuntimeImages {
    pub builder_image: String,
    pub runtime_image: String,
    pub default_version: String,
    /// Directory in the builder image whose contents the runtime stage copies
    #[serde(default = "artifact_path_default")]
    pub artifact_path: String,
}

fn artifact_path_default() -> String {
    String::from("/deployments")
}

impl RuntimeImages {
    fn new(builder_image: &str, runtime_image: &str, default_version: &str, artifact_path: &str) -> Self {
        Self {
            builder_image: builder_image.to_string(),
            runtime_image: runtime_image.to_string(),
            default_version: default_version.to_string(),
            artifact_path: artifact_path.to_string(),
        }
    }
}

pub fn runtimes_default() -> HashMap<String, RuntimeImages> {
    let java = |version: &str| {
        RuntimeImages::new(
            "registry.access.redhat.com/ubi8/openjdk-17",
            "registry.access.redhat.com/ubi8/openjdk-17-runtime",
            version,
            "/deployments",
        )
    };

    HashMap::from([
        ("spring-boot".to_string(), java("1.20")),
        ("vert.x".to_string(), java("1.20")),
        ("quarkus".to_string(), java("1.20")),
        (
            "nodejs".to_string(),
            RuntimeImages::new(
                "registry.access.redhat.com/ubi8/nodejs-20",
                "registry.access.redhat.com/ubi8/nodejs-20-minimal",
                "1",
                "/opt/app-root/src",
            ),
        ),
    ])
}
