pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod implementations;
pub mod metrics;
pub mod services;

use std::path::PathBuf;
use std::sync::Arc;
use std::{env, net::SocketAddr};

use factory::factories::{kubernetes::Kubernetes, observability::Observability};
use tokio::task::JoinSet;
use tracing::{error, info};
use utility::shutdown_signal::shutdown_signal;

use crate::{
    config::Config,
    error::AppError,
    metrics::Metrics,
    services::{
        controller::run_controller, kubernetes_service::KubernetesService, reconciler::Context,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // These are baked at COMPILE time
    let cargo_manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cargo_crate_name = env!("CARGO_CRATE_NAME");
    let cargo_pkg_name = env!("CARGO_PKG_NAME");
    let cargo_pkg_version = env!("CARGO_PKG_VERSION");

    // Load service-specific .env, then the workspace root one as fallback
    dotenvy::from_path(cargo_manifest_dir.join(".env")).ok();
    dotenvy::dotenv().ok();

    let path = env::var("CONFIG").unwrap_or("config.json".to_string());
    let cfg = Config::init(cargo_manifest_dir.join(path)).await?;

    let _guard = Observability::init(&cfg.observability, cargo_crate_name, cargo_pkg_version).await?;

    let kubernetes = Kubernetes::new(&cfg).await?;
    let metrics = Arc::new(Metrics::default());
    let service = KubernetesService {
        client: kubernetes.client.clone(),
        cfg: cfg.operator.clone(),
    };
    let ctx = Arc::new(Context {
        cluster: Arc::new(service),
        config: cfg.operator.clone(),
        metrics: metrics.clone(),
    });

    // Either task ending takes the whole operator down
    let mut set = JoinSet::new();
    let client = kubernetes.client.clone();
    set.spawn(async move { ("controller", run_controller(client, ctx).await) });
    set.spawn(async move {
        let served =
            start_health_server(cargo_pkg_name, cargo_pkg_version, cfg.server_address, metrics)
                .await;
        ("health server", served)
    });

    info!("✅ Controller and health server started");

    tokio::select! {
        _ = shutdown_signal() => {
            info!("🛑 Shutdown signal received");
            set.shutdown().await;
        }
        Some(joined) = set.join_next() => {
            match joined {
                Ok((task, Ok(()))) => error!("❌ {} exited unexpectedly", task),
                Ok((task, Err(e))) => error!("❌ {} failed: {}", task, e),
                Err(e) => error!("💥 Operator task panicked: {}", e),
            }
            set.shutdown().await;
        }
    }

    info!("👋 Shutting down gracefully...");

    Ok(())
}

async fn start_health_server(
    cargo_pkg_name: &'static str,
    cargo_pkg_version: &'static str,
    addr: SocketAddr,
    metrics: Arc<Metrics>,
) -> Result<(), AppError> {
    let app = app::app(cargo_pkg_name, cargo_pkg_version, metrics);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 {} health server running at {:#?}", cargo_pkg_name, addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
