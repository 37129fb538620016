//! Logging and span export for a run.
//!
//! Logs go to stderr so stdout carries only the progress lines of the run.
//! Spans are additionally shipped over OTLP when a collector is configured.

use anyhow::{Context, Result};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Install the global subscriber. Call once, before the first log line.
///
/// `RUST_LOG` overrides `log_level` when set.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &config.log_level)?;
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let endpoint = otlp_endpoint(std::env::var(OTLP_ENDPOINT_ENV).ok(), config);
    let Some(endpoint) = endpoint else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .context("Failed to install tracing subscriber")?;
        return Ok(());
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&endpoint)
        .build()
        .context("Failed to build OTLP span exporter")?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();
    let tracer = provider.tracer(config.service_name.clone());
    let _ = TRACER_PROVIDER.set(provider);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(endpoint = %endpoint, "OTLP span export enabled");
    Ok(())
}

/// Flush pending spans. Safe to call when export was never enabled.
pub fn shutdown_telemetry() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Error shutting down tracer provider: {:?}", e);
        }
    }
}

fn build_filter(rust_log: Option<&str>, fallback: &str) -> Result<EnvFilter> {
    let directives = match rust_log {
        Some(value) if !value.trim().is_empty() => value,
        _ => fallback,
    };
    EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))
}

fn otlp_endpoint(from_env: Option<String>, config: &TelemetryConfig) -> Option<String> {
    from_env
        .or_else(|| config.otlp_endpoint.clone())
        .filter(|e| !e.trim().is_empty())
}
