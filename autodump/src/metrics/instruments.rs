use opentelemetry::metrics::{Counter, Gauge, Meter};

/// Autodump metrics instruments
///
/// Holds all OpenTelemetry metric instruments for monitoring dump activity.
#[derive(Clone)]
pub struct AutodumpMetrics {
    // Dumps
    pub dumps_written: Counter<u64>,
    pub dumps_failed: Counter<u64>,
    pub dumps_rejected: Counter<u64>,
    pub dumps_today: Gauge<u64>,

    // Scheduler
    pub ticks_skipped: Counter<u64>,
    pub resource_sample: Gauge<f64>,
}

impl AutodumpMetrics {
    /// Create new metrics instance from a Meter
    pub fn new(meter: Meter) -> Self {
        Self {
            dumps_written: meter
                .u64_counter("autodump.dumps.written")
                .with_description("Snapshots written to disk")
                .build(),

            dumps_failed: meter
                .u64_counter("autodump.dumps.failed")
                .with_description("Snapshots that could not be written")
                .build(),

            dumps_rejected: meter
                .u64_counter("autodump.dumps.rejected")
                .with_description("Due snapshots denied by the daily budget")
                .build(),

            dumps_today: meter
                .u64_gauge("autodump.dumps.today")
                .with_description("Snapshots written since local midnight")
                .build(),

            ticks_skipped: meter
                .u64_counter("autodump.ticks.skipped")
                .with_description("Scheduler ticks without evaluation")
                .build(),

            resource_sample: meter
                .f64_gauge("autodump.resource.sample")
                .with_description("Latest sampled value per resource")
                .build(),
        }
    }
}
