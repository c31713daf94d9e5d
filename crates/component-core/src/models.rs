use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ---------------------------------------------
// ENUMS
// ---------------------------------------------

/// How a component gets its runtime image.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// Run the catalog runtime image as-is, no build pipeline.
    Dev,
    /// Build source into an image through the builder and runtime stages.
    #[default]
    Build,
}

/// The two chained stages every built component owns.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Builder,
    Runtime,
}

impl BuildStage {
    pub const ALL: [BuildStage; 2] = [BuildStage::Builder, BuildStage::Runtime];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Runtime => "runtime",
        }
    }

    /// Tag the stage pushes to on the component image stream
    pub fn output_tag(&self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Runtime => "latest",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle phase reported by the platform on a build run.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildPhase {
    #[default]
    New,
    Pending,
    Running,
    Complete,
    Failed,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl BuildPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::New | Self::Pending | Self::Running)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete | Self::Failed | Self::Error | Self::Cancelled
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Error)
    }
}

impl fmt::Display for BuildPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "New"),
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Complete => write!(f, "Complete"),
            Self::Failed => write!(f, "Failed"),
            Self::Error => write!(f, "Error"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    Provisioning,
    Deployed,
    Failed,
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "Provisioning"),
            Self::Deployed => write!(f, "Deployed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentBucket {
    Stopped,
    Starting,
    Ready,
}

// ---------------------------------------------
// MODELS
// ---------------------------------------------

/// Snapshot of one build definition, recomputed on every tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildState {
    pub image_exists: bool,
    pub build_running: bool,
    /// Pushed image reference when `image_exists`
    pub image: Option<String>,
    /// Newest run that ended in Failed or Error, if any
    pub last_failure: Option<FailedBuild>,
}

impl BuildState {
    pub fn published(image: String) -> Self {
        Self {
            image_exists: true,
            build_running: false,
            image: Some(image),
            last_failure: None,
        }
    }

    pub fn running() -> Self {
        Self {
            build_running: true,
            ..Default::default()
        }
    }

    pub fn idle(last_failure: Option<FailedBuild>) -> Self {
        Self {
            last_failure,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedBuild {
    pub name: String,
    pub phase: BuildPhase,
    pub message: Option<String>,
}

/// `name:tag` pair addressing a tag of an image stream
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub name: String,
    pub tag: String,
}

impl ImageReference {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (name, tag) = raw.rsplit_once(':')?;
        if name.is_empty() || tag.is_empty() || tag.contains('/') {
            return None;
        }
        Some(Self::new(name, tag))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

// ---------------------------------------------
// HELPER STRUCTS FOR SPEC FIELDS
// ---------------------------------------------

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
pub struct EnvEntry {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

impl EnvEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Container resource requests and limits
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    pub cpu_request_millicores: i32,
    pub cpu_limit_millicores: i32,
    pub memory_request_mb: i32,
    pub memory_limit_mb: i32,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            cpu_request_millicores: 250,
            cpu_limit_millicores: 500,
            memory_request_mb: 256,
            memory_limit_mb: 512,
        }
    }
}

impl fmt::Display for ResourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceSpec {{ CPU: {}-{} millicores, Memory: {}-{} MB }}",
            self.cpu_request_millicores,
            self.cpu_limit_millicores,
            self.memory_request_mb,
            self.memory_limit_mb
        )
    }
}
