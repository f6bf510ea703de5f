//! Common trait for metrics recorders

use autodump_core::monitor::ResourceKind;

/// Metrics recorder trait
///
/// Implemented by both OtelRecorder and NoOpRecorder
pub trait MetricsRecorder: Send + Sync {
    fn record_dump_written(&self, kind: ResourceKind);
    fn record_dump_failed(&self, kind: ResourceKind);
    /// The daily budget denied a dump that was due
    fn record_dump_rejected(&self, kind: ResourceKind);
    fn record_tick_skipped(&self, reason: &str);

    fn record_resource_sample(&self, kind: ResourceKind, value: f64);
    fn record_dumps_today(&self, count: u32);
}
