//! No-op metrics implementation for builds and hosts without telemetry

use super::recorder_trait::MetricsRecorder;
use autodump_core::monitor::ResourceKind;

/// Zero-cost no-op recorder
pub(crate) struct NoOpRecorder;

impl NoOpRecorder {
    pub(crate) const fn new() -> Self {
        Self
    }
}

impl MetricsRecorder for NoOpRecorder {
    #[inline(always)]
    fn record_dump_written(&self, _kind: ResourceKind) {}

    #[inline(always)]
    fn record_dump_failed(&self, _kind: ResourceKind) {}

    #[inline(always)]
    fn record_dump_rejected(&self, _kind: ResourceKind) {}

    #[inline(always)]
    fn record_tick_skipped(&self, _reason: &str) {}

    #[inline(always)]
    fn record_resource_sample(&self, _kind: ResourceKind, _value: f64) {}

    #[inline(always)]
    fn record_dumps_today(&self, _count: u32) {}
}
