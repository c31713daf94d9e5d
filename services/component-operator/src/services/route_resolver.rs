use std::time::Duration;

use component_core::resources::{OwnedResource, ResourceKind};
use tracing::{debug, info};

use crate::error::AppError;
use crate::services::cluster::Cluster;

/// Bounded wait for the platform to assign a route host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutePolling {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for RoutePolling {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval: Duration::from_millis(100),
        }
    }
}

/// Returns the assigned host, or an empty string when none shows up in time.
/// The next reconcile tries again.
#[tracing::instrument(
    name = "route_resolver.resolve",
    skip_all,
    fields(namespace = %namespace, route = %name),
    err
)]
pub async fn resolve_route_host<C>(
    cluster: &C,
    namespace: &str,
    name: &str,
    polling: RoutePolling,
) -> Result<String, AppError>
where
    C: Cluster + ?Sized,
{
    for attempt in 1..=polling.attempts {
        if let Some(OwnedResource::Route(route)) =
            cluster.fetch(ResourceKind::Route, namespace, name).await?
        {
            let host = if route.spec.host.is_empty() {
                route
                    .status
                    .and_then(|status| status.ingress.into_iter().find_map(|ingress| ingress.host))
                    .unwrap_or_default()
            } else {
                route.spec.host
            };

            if !host.is_empty() {
                info!("🌐 Route {}/{} resolved to {}", namespace, name, host);
                return Ok(host);
            }
        }

        if attempt < polling.attempts {
            tokio::time::sleep(polling.interval).await;
        }
    }

    debug!(
        "⌛ Route {}/{} has no host after {} attempts",
        namespace, name, polling.attempts
    );
    Ok(String::new())
}
