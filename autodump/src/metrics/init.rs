use super::instruments::AutodumpMetrics;
use super::otel_recorder::OtelRecorder;
use anyhow::{Context, Result};
use opentelemetry::metrics::MeterProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};
use std::time::Duration;

/// autodump runs inside the host process, so by default it reports to a
/// collector on the same machine (sidecar or node agent) over gRPC.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Dump counters change at most once per scheduler tick, a slower export
/// than the tick keeps the exporter cheap.
const EXPORT_INTERVAL: Duration = Duration::from_secs(30);

fn otlp_endpoint() -> String {
    std::env::var("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT")
        .or_else(|_| std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT"))
        .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string())
}

/// Export dump metrics via OTLP and make them the target of
/// [`super::metrics`]. Fails if a recorder was installed before.
pub fn init_metrics() -> Result<AutodumpMetrics> {
    let endpoint = otlp_endpoint();
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint.clone())
        .build()
        .with_context(|| format!("Failed to build OTLP metric exporter for {endpoint}"))?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(EXPORT_INTERVAL)
        .build();

    // The host owns the service name, autodump only tags itself as a scope
    let resource = Resource::builder()
        .with_attribute(KeyValue::new("autodump.version", env!("CARGO_PKG_VERSION")))
        .with_attribute(KeyValue::new("process.pid", i64::from(std::process::id())))
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build();

    let metrics = AutodumpMetrics::new(provider.meter("autodump"));
    if !super::set_recorder(Box::new(OtelRecorder::new(metrics.clone()))) {
        anyhow::bail!("Dump metrics recorder already initialized");
    }
    global::set_meter_provider(provider);

    tracing::debug!("Exporting dump metrics to {}", endpoint);
    Ok(metrics)
}
