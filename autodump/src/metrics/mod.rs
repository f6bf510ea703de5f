//! Metrics for dump activity.
//!
//! A no-op recorder is active unless `init_metrics` installed the
//! OpenTelemetry recorder (feature `telemetry`).

#[cfg(feature = "telemetry")]
mod init;
#[cfg(feature = "telemetry")]
mod instruments;
mod noop;
#[cfg(feature = "telemetry")]
mod otel_recorder;
mod recorder_trait;

use std::sync::OnceLock;

#[cfg(feature = "telemetry")]
pub use init::init_metrics;
#[cfg(feature = "telemetry")]
pub use instruments::AutodumpMetrics;
pub use recorder_trait::MetricsRecorder;

use noop::NoOpRecorder;

/// Global recorder instance
static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();
static NOOP: NoOpRecorder = NoOpRecorder::new();

/// Get the active recorder
pub fn metrics() -> &'static dyn MetricsRecorder {
    RECORDER.get().map(|r| r.as_ref()).unwrap_or(&NOOP)
}

/// Install the global recorder. Returns false if one was installed before.
#[allow(dead_code)] // only called with the telemetry feature
pub(crate) fn set_recorder(recorder: Box<dyn MetricsRecorder>) -> bool {
    RECORDER.set(recorder).is_ok()
}
