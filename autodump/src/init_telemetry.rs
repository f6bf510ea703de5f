use anyhow::Result;
use tracing::{info, warn, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, Layer};
use tracing_subscriber::{registry, EnvFilter};

use crate::settings::config::Settings;

pub fn build_logger_text<S>() -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if cfg!(debug_assertions) {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_line_number(false)
                .with_thread_names(false)
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_target(true)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
                .event_format(tracing_subscriber::fmt::format().compact()),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::SystemTime)
                .with_target(true),
        )
    }
}

/// `RUST_LOG` wins, otherwise `debug` decides between debug and info.
pub fn build_loglevel_filter_layer(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

pub fn init_telemetry_and_tracing(settings: &Settings) -> Result<()> {
    registry()
        .with(build_loglevel_filter_layer(settings.debug))
        .with(build_logger_text())
        .try_init()?;
    info!("init logging");

    if settings.metrics_enabled() {
        init_metrics();
    }

    Ok(())
}

#[cfg(feature = "telemetry")]
fn init_metrics() {
    match crate::metrics::init_metrics() {
        Ok(_) => info!("OpenTelemetry metrics initialized successfully"),
        Err(e) => warn!("Failed to initialize metrics: {}", e),
    }
}

#[cfg(not(feature = "telemetry"))]
fn init_metrics() {
    warn!("Metrics requested, but autodump was built without the telemetry feature");
}
