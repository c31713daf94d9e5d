use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use tracing::info;

use crate::factories::kubernetes::{Kubernetes, error::KubernetesError};

/// Where the operator finds its cluster credentials.
pub trait KubernetesConfig {
    fn k8s_in_cluster(&self) -> bool;
    fn k8s_config_path(&self) -> Option<String>;
}

async fn load_config<T: KubernetesConfig>(config: &T) -> Result<Config, KubernetesError> {
    if config.k8s_in_cluster() {
        return Ok(Config::incluster()?);
    }

    match config.k8s_config_path() {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(&path)?;
            Ok(Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?)
        }
        None => Ok(Config::infer().await?),
    }
}

impl Kubernetes {
    pub async fn new<T: KubernetesConfig>(config: &T) -> Result<Self, KubernetesError> {
        let kube_config = load_config(config).await?;
        info!(
            "✅ Connected to {} (default namespace {})",
            kube_config.cluster_url, kube_config.default_namespace
        );

        let client = Client::try_from(kube_config)?;
        Ok(Self { client })
    }
}
