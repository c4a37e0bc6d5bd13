//! Logging and trace export setup

use anyhow::{Context as _, Result};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, TelemetryConfig};
use crate::trace::SpanFactory;

/// Keeps the tracer provider alive; flush it with [`TelemetryGuard::shutdown`]
pub struct TelemetryGuard {
    provider: SdkTracerProvider,
}

impl TelemetryGuard {
    pub fn shutdown(self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Failed to shut down tracer provider");
        }
    }
}

/// Tracer provider for `config`, exporting over OTLP/HTTP when an endpoint is set
pub fn build_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .build();
    let builder = SdkTracerProvider::builder().with_resource(resource);

    let builder = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .build()
                .with_context(|| format!("Failed to build OTLP exporter for {endpoint}"))?;
            builder.with_batch_exporter(exporter)
        }
        None => builder,
    };

    Ok(builder.build())
}

/// Install the global `tracing` subscriber and return the span factory
/// that resolvers use for their outbound spans.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(
    logging: &LoggingConfig,
    telemetry: &TelemetryConfig,
) -> Result<(TelemetryGuard, SpanFactory)> {
    let provider = build_provider(telemetry)?;
    let tracer = provider.tracer(telemetry.service_name.clone());

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level: {}", logging.level))?,
    };
    let json = logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_opentelemetry::layer().with_tracer(tracer.clone()))
        .with(json.then(|| fmt::layer().json().with_current_span(true)))
        .with((!json).then(|| fmt::layer().with_target(false).compact()))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if telemetry.otlp_endpoint.is_none() {
        tracing::debug!("No OTLP endpoint configured, spans are not exported");
    }

    Ok((TelemetryGuard { provider }, SpanFactory::new(tracer)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Context;

    #[test]
    fn test_provider_without_exporter() {
        let config = TelemetryConfig {
            service_name: "cep-weather-test".to_string(),
            otlp_endpoint: None,
        };
        let provider = build_provider(&config).unwrap();
        let spans = SpanFactory::new(provider.tracer("test"));
        let hop = spans.start_client_span("hop", &Context::new(), Vec::new());
        let _: Result<(), _> = hop.finish(Ok(()));
        let _ = provider.shutdown();
    }

    #[test]
    fn test_provider_with_otlp_endpoint() {
        let config = TelemetryConfig {
            service_name: "cep-weather-test".to_string(),
            otlp_endpoint: Some("http://127.0.0.1:4318/v1/traces".to_string()),
        };
        let provider = build_provider(&config).unwrap();
        drop(provider);
    }
}
