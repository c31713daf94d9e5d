use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubernetesError {
    #[error("Cluster client error, {0}")]
    Client(#[from] kube::Error),
    #[error("In-cluster credentials unavailable, {0}")]
    InCluster(#[from] kube_client::config::InClusterError),
    #[error("Kubeconfig could not be loaded, {0}")]
    Kubeconfig(#[from] kube_client::config::KubeconfigError),
    #[error("No cluster configuration could be inferred, {0}")]
    InferConfig(#[from] kube_client::config::InferConfigError),
}
