use std::path::PathBuf;

use serde::Deserialize;

use super::interval::DumpInterval;
use crate::budget::BudgetPolicy;
use crate::error::SettingsError;
use crate::monitor::ResourceKind;
use crate::window::DEFAULT_WINDOW_CAPACITY;

/// Minimum time between two dumps of the same resource kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub memory: DumpInterval,
    pub cpu: DumpInterval,
    pub goroutine: DumpInterval,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            memory: DumpInterval::Minutes(10),
            cpu: DumpInterval::Minutes(10),
            goroutine: DumpInterval::Minutes(1),
        }
    }
}

impl Thresholds {
    pub fn for_kind(&self, kind: ResourceKind) -> DumpInterval {
        match kind {
            ResourceKind::Memory => self.memory,
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Goroutine => self.goroutine,
        }
    }
}

/// Everything the dump scheduler needs to know, fixed at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DumpSettings {
    /// Directory receiving `<kind>.dump_<timestamp>` files
    pub dump_directory: PathBuf,
    /// Create `dump_directory` on startup if it is missing
    pub create_directory: bool,
    pub max_dumps_per_day: u32,
    pub budget_policy: BudgetPolicy,
    pub tick_interval: DumpInterval,
    /// How long a cpu profile keeps recording before it is written
    pub cpu_profile_duration: DumpInterval,
    pub window_size: usize,
    /// A task count above `average * task_spike_ratio` triggers a stack dump
    pub task_spike_ratio: f64,
    pub thresholds: Thresholds,
}

impl Default for DumpSettings {
    fn default() -> Self {
        DumpSettings {
            dump_directory: PathBuf::from("./"),
            create_directory: true,
            max_dumps_per_day: 10,
            budget_policy: BudgetPolicy::default(),
            tick_interval: DumpInterval::Seconds(5),
            cpu_profile_duration: DumpInterval::Seconds(10),
            window_size: DEFAULT_WINDOW_CAPACITY,
            task_spike_ratio: 1.25,
            thresholds: Thresholds::default(),
        }
    }
}

impl DumpSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.tick_interval.is_zero() {
            return Err(SettingsError::Invalid(
                "tick_interval must be greater than zero".into(),
            ));
        }
        if self.window_size == 0 {
            return Err(SettingsError::Invalid(
                "window_size must be greater than zero".into(),
            ));
        }
        if !self.task_spike_ratio.is_finite() || self.task_spike_ratio <= 0.0 {
            return Err(SettingsError::Invalid(format!(
                "task_spike_ratio must be a positive number, got {}",
                self.task_spike_ratio
            )));
        }
        Ok(())
    }
}
