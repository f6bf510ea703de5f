//! OpenTelemetry metrics recorder wrapping AutodumpMetrics

use super::instruments::AutodumpMetrics;
use super::recorder_trait::MetricsRecorder;
use autodump_core::monitor::ResourceKind;
use opentelemetry::KeyValue;

pub(crate) struct OtelRecorder {
    instruments: AutodumpMetrics,
}

impl OtelRecorder {
    pub(crate) fn new(instruments: AutodumpMetrics) -> Self {
        Self { instruments }
    }
}

fn kind_attr(kind: ResourceKind) -> [KeyValue; 1] {
    [KeyValue::new("kind", kind.as_str())]
}

impl MetricsRecorder for OtelRecorder {
    fn record_dump_written(&self, kind: ResourceKind) {
        self.instruments.dumps_written.add(1, &kind_attr(kind));
    }

    fn record_dump_failed(&self, kind: ResourceKind) {
        self.instruments.dumps_failed.add(1, &kind_attr(kind));
    }

    fn record_dump_rejected(&self, kind: ResourceKind) {
        self.instruments.dumps_rejected.add(1, &kind_attr(kind));
    }

    fn record_tick_skipped(&self, reason: &str) {
        self.instruments
            .ticks_skipped
            .add(1, &[KeyValue::new("reason", reason.to_string())]);
    }

    fn record_resource_sample(&self, kind: ResourceKind, value: f64) {
        self.instruments
            .resource_sample
            .record(value, &kind_attr(kind));
    }

    fn record_dumps_today(&self, count: u32) {
        self.instruments.dumps_today.record(u64::from(count), &[]);
    }
}
