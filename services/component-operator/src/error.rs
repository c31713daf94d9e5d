use component_core::error::ResourceError;
use factory::factories::kubernetes::error::KubernetesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Kube error, {0}")]
    KubeError(#[from] kube::Error),

    #[error("Kubernetes client error, {0}")]
    KubernetesError(#[from] KubernetesError),

    // The owning component vanished between the event and the write
    #[error("Component {namespace}/{name} not found")]
    ComponentNotFound { namespace: String, name: String },

    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Conflict writing {kind} {namespace}/{name}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Component {0} builds from source but declares no git repository")]
    MissingSource(String),

    #[error("Runtime {0} is not in the runtime catalog")]
    UnknownRuntime(String),

    #[error("Resource error, {0}")]
    ResourceError(#[from] ResourceError),

    #[error("Serde json error, {0}")]
    SerdejsonError(#[from] serde_json::Error),

    #[error("IO error, {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal server error, {0}")]
    InternalServerError(String),
}

/// How the reconcile driver reacts to an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Owning component is gone, nothing left to do
    Deleted,
    /// Retry with backoff, nothing recorded on the component
    Transient,
    /// Recorded as a Failed condition, still retried
    Domain,
}
