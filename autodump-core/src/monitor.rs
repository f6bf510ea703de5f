use std::fmt;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::window::{RollingWindow, Sample};

/// The resources the scheduler evaluates, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Memory,
    Cpu,
    Goroutine,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Memory,
        ResourceKind::Cpu,
        ResourceKind::Goroutine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Goroutine => "goroutine",
        }
    }

    /// Prefix of the snapshot file written for this resource.
    pub fn snapshot_name(&self) -> &'static str {
        match self {
            ResourceKind::Memory => "heap",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Goroutine => "goroutine",
        }
    }

    /// Short tag used in the `dump <tag>` log line.
    pub fn log_tag(&self) -> &'static str {
        match self {
            ResourceKind::Memory => "mem",
            ResourceKind::Cpu => "cpu",
            ResourceKind::Goroutine => "g",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a monitor fires once its minimum interval has elapsed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerRule {
    /// Fire on every evaluation past the interval (scheduled checkpoint).
    IntervalOnly,
    /// Fire when the sample exceeds the window average times the ratio.
    SpikeRatio(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerDecision {
    pub fire: bool,
    /// Window average including the sample that was just pushed
    pub average: f64,
}

/// Per-resource history plus the bookkeeping needed to rate limit dumps.
#[derive(Debug, Clone)]
pub struct ResourceMonitor<T> {
    kind: ResourceKind,
    window: RollingWindow<T>,
    last_dump_at: Option<DateTime<Local>>,
    min_interval: chrono::Duration,
    rule: TriggerRule,
}

impl<T: Sample> ResourceMonitor<T> {
    pub fn new(
        kind: ResourceKind,
        window_size: usize,
        min_interval: chrono::Duration,
        rule: TriggerRule,
    ) -> Self {
        Self {
            kind,
            window: RollingWindow::with_capacity(window_size),
            last_dump_at: None,
            min_interval,
            rule,
        }
    }

    /// Record `sample` and decide whether a dump is due at `now`.
    ///
    /// The sample always lands in the window, even when the interval gate
    /// rejects the evaluation.
    pub fn decide(&mut self, now: DateTime<Local>, sample: T) -> TriggerDecision {
        self.window.push(sample);
        let average = self.window.average().unwrap_or_else(|| sample.as_f64());

        let interval_elapsed = match self.last_dump_at {
            Some(last) => now.signed_duration_since(last) >= self.min_interval,
            None => true,
        };

        let fire = interval_elapsed
            && match self.rule {
                TriggerRule::IntervalOnly => true,
                TriggerRule::SpikeRatio(ratio) => sample.as_f64() > average * ratio,
            };

        tracing::trace!(
            kind = %self.kind,
            sample = sample.as_f64(),
            average,
            interval_elapsed,
            fire,
            "Evaluated resource"
        );

        TriggerDecision { fire, average }
    }

    /// Remember a successful dump. Earlier timestamps than the current one are ignored.
    pub fn mark_dumped(&mut self, now: DateTime<Local>) {
        if self.last_dump_at.is_none_or(|last| now > last) {
            self.last_dump_at = Some(now);
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn window(&self) -> &RollingWindow<T> {
        &self.window
    }

    pub fn last_dump_at(&self) -> Option<DateTime<Local>> {
        self.last_dump_at
    }

    pub fn min_interval(&self) -> chrono::Duration {
        self.min_interval
    }
}
