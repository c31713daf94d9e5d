use factory::factories::kubernetes::implementation::KubernetesConfig;

use crate::config::Config;
use crate::error::{AppError, ErrorClass};

// -------------------------------------------------------------------------------
// ---------------------------- Error implementations ----------------------------
// -------------------------------------------------------------------------------

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::ComponentNotFound { .. } => ErrorClass::Deleted,
            AppError::MissingSource(_)
            | AppError::UnknownRuntime(_)
            | AppError::ResourceError(_)
            | AppError::SerdejsonError(_)
            | AppError::IoError(_)
            | AppError::InternalServerError(_) => ErrorClass::Domain,
            AppError::KubeError(_)
            | AppError::KubernetesError(_)
            | AppError::NotFound { .. }
            | AppError::Conflict { .. } => ErrorClass::Transient,
        }
    }

    /// Reason code written onto a Failed condition
    pub fn reason(&self) -> &'static str {
        match self {
            AppError::MissingSource(_) => "MissingSource",
            AppError::UnknownRuntime(_) => "UnknownRuntime",
            AppError::ResourceError(_) => "InvalidResource",
            AppError::SerdejsonError(_) => "InvalidPayload",
            AppError::IoError(_) => "IoError",
            AppError::InternalServerError(_) => "InternalError",
            AppError::ComponentNotFound { .. } => "Deleted",
            AppError::Conflict { .. } => "Conflict",
            AppError::NotFound { .. } => "NotFound",
            _ => "ClusterError",
        }
    }
}

// -------------------------------------------------------------------------------
// --------------------------- Factory implementations ---------------------------
// -------------------------------------------------------------------------------

impl KubernetesConfig for Config {
    fn k8s_in_cluster(&self) -> bool {
        self.kubernetes.in_cluster
    }

    fn k8s_config_path(&self) -> Option<String> {
        self.kubernetes.kubeconfig.clone()
    }
}
