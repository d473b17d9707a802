use anyhow::Result;
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::{
    metrics::{PeriodicReader, SdkMeterProvider},
    Resource,
};
use tracing::info;

use crate::config::TelemetryConfig;

/// Install a global meter provider that pushes to an OTLP collector.
///
/// Returns `None` when metrics are disabled; instruments created from the
/// global meter are then no-ops.
pub fn init_provider(
    telemetry: &TelemetryConfig,
    env: &str,
    service_version: &str,
) -> Result<Option<SdkMeterProvider>> {
    if !telemetry.enable_metrics {
        return Ok(None);
    }

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", "bundle-server"))
        .with_attribute(KeyValue::new("service.version", service_version.to_string()))
        .with_attribute(KeyValue::new("deployment.environment", env.to_string()))
        .build();

    let mut exporter = MetricExporter::builder().with_tonic();
    if let Some(endpoint) = &telemetry.endpoint {
        exporter = exporter.with_endpoint(endpoint.to_owned());
    }
    let exporter = exporter.build()?;

    let reader = PeriodicReader::builder(exporter)
        .with_interval(telemetry.metrics_interval())
        .build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider.clone());
    info!(
        endpoint = telemetry.endpoint.as_deref().unwrap_or("default"),
        interval_secs = telemetry.metrics_interval_secs,
        "exporting metrics over otlp"
    );
    Ok(Some(provider))
}
