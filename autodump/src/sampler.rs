use autodump_core::error::SampleError;
use sysinfo::{Pid, Process, ProcessesToUpdate, System};
use tracing::debug;

use crate::alloc::AllocationStats;

/// Source of the numbers the dump scheduler evaluates.
///
/// Called from the scheduler task only, once per resource and tick.
pub trait ResourceSampler: Send {
    /// Resident memory of the process as percentage of total memory
    fn memory_percent(&mut self) -> Result<f64, SampleError>;

    fn allocation_stats(&mut self) -> Result<AllocationStats, SampleError>;

    /// Cpu usage of the process, normalized to 0..=100 across all cores
    fn cpu_percent(&mut self) -> Result<f64, SampleError>;

    /// Number of live tasks (or threads) of the process
    fn task_count(&mut self) -> usize;
}

/// Samples the current process through sysinfo and the tokio runtime.
pub struct SystemSampler {
    system: System,
    pid: Pid,
    num_cpus: f64,
}

impl SystemSampler {
    pub fn new() -> Result<Self, SampleError> {
        let pid = sysinfo::get_current_pid().map_err(|e| SampleError::Pid(e.to_string()))?;
        let mut system = System::new();
        // Initial refresh to establish a baseline for cpu usage
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.refresh_memory();

        Ok(Self {
            system,
            pid,
            num_cpus: num_cpus::get().max(1) as f64,
        })
    }

    fn refresh_process(&mut self) -> Result<&Process, SampleError> {
        self.system
            .refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
        self.system
            .process(self.pid)
            .ok_or(SampleError::ProcessUnavailable(self.pid.as_u32()))
    }
}

impl ResourceSampler for SystemSampler {
    fn memory_percent(&mut self) -> Result<f64, SampleError> {
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            return Err(SampleError::TotalMemoryUnknown);
        }
        let rss = self.refresh_process()?.memory();
        let percent = rss as f64 / total as f64 * 100.0;

        debug!(
            "Memory usage: RSS={} MB of {} MB ({:.2}%)",
            rss / 1024 / 1024,
            total / 1024 / 1024,
            percent
        );
        Ok(percent)
    }

    fn allocation_stats(&mut self) -> Result<AllocationStats, SampleError> {
        AllocationStats::current().ok_or(SampleError::AllocationTrackingDisabled)
    }

    fn cpu_percent(&mut self) -> Result<f64, SampleError> {
        let num_cpus = self.num_cpus;
        // sysinfo reports 0..num_cpus*100
        let usage = f64::from(self.refresh_process()?.cpu_usage()) / num_cpus;
        debug!("Cpu usage: {:.2}%", usage);
        Ok(usage)
    }

    fn task_count(&mut self) -> usize {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            return handle.metrics().num_alive_tasks();
        }
        match self.refresh_process() {
            Ok(process) => process.tasks().map(|tasks| tasks.len()).unwrap_or(1),
            Err(e) => {
                debug!("Falling back to a single thread: {}", e);
                1
            }
        }
    }
}
