pub mod implementations;

use kube::Client;

use crate::config::OperatorConfig;

#[derive(Clone)]
pub struct KubernetesService {
    pub client: Client,
    pub cfg: OperatorConfig,
}
