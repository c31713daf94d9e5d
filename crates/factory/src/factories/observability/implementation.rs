use std::time::Duration;

use opentelemetry::{KeyValue, global, trace::TracerProvider as _};
use opentelemetry_otlp::{
    Compression, MetricExporter, SpanExporter, WithExportConfig, WithTonicConfig,
};
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
    propagation::TraceContextPropagator,
    trace::{Sampler, SdkTracerProvider},
};
use opentelemetry_semantic_conventions::{SCHEMA_URL, attribute::SERVICE_VERSION};
use time::macros::format_description;
use tonic::transport::ClientTlsConfig;
use tracing::{Level, Subscriber};
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer};
use tracing_subscriber::{
    EnvFilter, Layer, fmt::time::LocalTime, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use crate::factories::observability::{
    Observability, ObservabilityConfig, error::ObservabilityError,
};

/// Watch streams are chatty at info, keep them at warn unless RUST_LOG says otherwise
const QUIET_TARGETS: &str = "kube_runtime=warn,kube_client=warn,hyper_util=warn";

impl Drop for Observability {
    fn drop(&mut self) {
        if let Some(err) = self
            .tracer_provider
            .as_ref()
            .and_then(|provider| provider.shutdown().err())
        {
            eprintln!("tracer provider shutdown: {err:?}");
        }
        if let Some(err) = self
            .meter_provider
            .as_ref()
            .and_then(|provider| provider.shutdown().err())
        {
            eprintln!("meter provider shutdown: {err:?}");
        }
    }
}

impl Observability {
    /// Installs the global subscriber. Exporters are only started when an
    /// OTLP endpoint is configured; the returned guard flushes them on drop.
    pub async fn init(
        config: &ObservabilityConfig,
        cargo_crate_name: &str,
        cargo_pkg_version: &str,
    ) -> Result<Observability, ObservabilityError> {
        global::set_text_map_propagator(TraceContextPropagator::new());

        let mut observability = Observability {
            tracer_provider: None,
            meter_provider: None,
        };

        if let Some(endpoint) = config.otel_exporter_otlp_endpoint.as_deref() {
            let resource = service_resource(cargo_crate_name, cargo_pkg_version);
            observability.tracer_provider = Some(tracer_provider(resource.clone(), endpoint)?);
            observability.meter_provider = Some(meter_provider(resource, endpoint)?);
        }

        let otel_layer = observability
            .tracer_provider
            .as_ref()
            .map(|provider| OpenTelemetryLayer::new(provider.tracer(cargo_crate_name.to_string())));
        let metrics_layer = observability
            .meter_provider
            .as_ref()
            .map(|provider| MetricsLayer::new(provider.clone()));

        tracing_subscriber::registry()
            .with(log_filter(config))
            .with(stdout_layer(config))
            .with(metrics_layer)
            .with(otel_layer)
            .try_init()?;

        Ok(observability)
    }
}

fn log_filter(config: &ObservabilityConfig) -> EnvFilter {
    if let Some(directives) = config.rust_log.as_deref() {
        return EnvFilter::new(directives);
    }

    let level = config
        .tracing_level
        .as_deref()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},{}",
            level.as_str().to_lowercase(),
            QUIET_TARGETS
        ))
    })
}

/// Compact lines for local runs, flattened json everywhere else
fn stdout_layer<S>(config: &ObservabilityConfig) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ));
    let layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(false)
        .with_file(config.with_file.unwrap_or(true))
        .with_line_number(config.with_line_number.unwrap_or(true));

    match config.log_format.as_deref() {
        Some("pretty") => layer.with_ansi(true).compact().boxed(),
        _ => layer
            .json()
            .flatten_event(true)
            .with_span_list(false)
            .boxed(),
    }
}

fn service_resource(cargo_crate_name: &str, cargo_pkg_version: &str) -> Resource {
    Resource::builder()
        .with_service_name(cargo_crate_name.to_string())
        .with_schema_url(
            [KeyValue::new(SERVICE_VERSION, cargo_pkg_version.to_string())],
            SCHEMA_URL,
        )
        .build()
}

fn exporter_tls(endpoint: &str) -> Option<ClientTlsConfig> {
    endpoint
        .starts_with("https://")
        .then(|| ClientTlsConfig::new().with_native_roots())
}

fn tracer_provider(
    resource: Resource,
    endpoint: &str,
) -> Result<SdkTracerProvider, ObservabilityError> {
    let mut builder = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_compression(Compression::Gzip);
    if let Some(tls) = exporter_tls(endpoint) {
        builder = builder.with_tls_config(tls);
    }

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(builder.build()?)
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_resource(resource)
        .build();
    global::set_tracer_provider(provider.clone());

    eprintln!("📤 OTLP traces exported to {endpoint}");
    Ok(provider)
}

fn meter_provider(
    resource: Resource,
    endpoint: &str,
) -> Result<SdkMeterProvider, ObservabilityError> {
    let mut builder = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_compression(Compression::Gzip);
    if let Some(tls) = exporter_tls(endpoint) {
        builder = builder.with_tls_config(tls);
    }

    let reader = PeriodicReader::builder(builder.build()?)
        .with_interval(Duration::from_secs(30))
        .build();
    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();
    global::set_meter_provider(provider.clone());

    eprintln!("📊 OTLP metrics exported to {endpoint}");
    Ok(provider)
}
