//! Encoders turning the state of the process into snapshot file contents.

use std::fs::File;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use autodump_core::{error::SnapshotError, monitor::ResourceKind};
use chrono::{DateTime, Local};
use serde::Serialize;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, error};

use crate::alloc::AllocationStats;

/// Writes the profiling artifacts into files opened by the snapshot sink.
///
/// Shared between the scheduler task and the deferred cpu stop task.
pub trait ProfileWriter: Send + Sync {
    fn write_heap_snapshot(&self, file: &mut File) -> Result<(), SnapshotError>;

    /// Begin recording a cpu profile into `file`. Fails with
    /// [`SnapshotError::CaptureActive`] while another capture is running.
    fn start_cpu_snapshot(&self, file: File) -> Result<(), SnapshotError>;

    /// Finish the running cpu capture and flush it to its file. Does nothing
    /// if no capture is running.
    fn stop_cpu_snapshot(&self);

    fn write_stack_snapshot(&self, file: &mut File) -> Result<(), SnapshotError>;
}

pub(crate) fn write_report<T: Serialize>(
    file: &mut File,
    kind: ResourceKind,
    report: &T,
) -> Result<(), SnapshotError> {
    let bytes =
        serde_json::to_vec_pretty(report).map_err(|e| SnapshotError::encode(kind, e.to_string()))?;
    file.write_all(&bytes)
        .and_then(|_| file.flush())
        .map_err(|e| SnapshotError::write(kind, e))
}

#[derive(Debug, Serialize)]
struct HeapReport {
    captured_at: DateTime<Local>,
    pid: u32,
    rss_bytes: u64,
    virtual_bytes: u64,
    total_memory_bytes: u64,
    allocations: Option<AllocationStats>,
}

#[derive(Debug, Serialize)]
struct CpuReport {
    started_at: DateTime<Local>,
    stopped_at: DateTime<Local>,
    duration_ms: i64,
    /// Average usage over the capture window, 0..=100 across all cores
    cpu_usage_percent: f64,
    num_cpus: usize,
    run_time_secs: u64,
}

#[derive(Debug, Serialize)]
struct StackReport {
    captured_at: DateTime<Local>,
    pid: u32,
    alive_tasks: Option<usize>,
    os_threads: Option<usize>,
    /// Backtrace of the thread writing the snapshot
    backtrace: String,
}

struct CpuCapture {
    file: File,
    started_at: DateTime<Local>,
}

/// Default writer: JSON reports built from sysinfo, the tokio runtime and
/// the allocation counters.
pub struct ProcessProfileWriter {
    system: Mutex<System>,
    pid: Pid,
    capture: Mutex<Option<CpuCapture>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ProcessProfileWriter {
    pub fn new() -> Result<Self, autodump_core::error::SampleError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| autodump_core::error::SampleError::Pid(e.to_string()))?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
            capture: Mutex::new(None),
        })
    }

    fn refresh(&self, system: &mut System) {
        system.refresh_processes(ProcessesToUpdate::Some(&[self.pid]), true);
    }

    fn finish_capture(&self, capture: CpuCapture) -> Result<(), SnapshotError> {
        let CpuCapture {
            mut file,
            started_at,
        } = capture;
        let stopped_at = Local::now();

        let report = {
            let mut system = lock(&self.system);
            self.refresh(&mut system);
            let (usage, run_time) = system
                .process(self.pid)
                .map(|p| (f64::from(p.cpu_usage()), p.run_time()))
                .unwrap_or((0.0, 0));
            let num_cpus = num_cpus::get().max(1);
            CpuReport {
                started_at,
                stopped_at,
                duration_ms: stopped_at
                    .signed_duration_since(started_at)
                    .num_milliseconds(),
                cpu_usage_percent: usage / num_cpus as f64,
                num_cpus,
                run_time_secs: run_time,
            }
        };

        write_report(&mut file, ResourceKind::Cpu, &report)
    }
}

impl ProfileWriter for ProcessProfileWriter {
    fn write_heap_snapshot(&self, file: &mut File) -> Result<(), SnapshotError> {
        let report = {
            let mut system = lock(&self.system);
            system.refresh_memory();
            self.refresh(&mut system);
            let (rss, virt) = system
                .process(self.pid)
                .map(|p| (p.memory(), p.virtual_memory()))
                .unwrap_or((0, 0));
            HeapReport {
                captured_at: Local::now(),
                pid: self.pid.as_u32(),
                rss_bytes: rss,
                virtual_bytes: virt,
                total_memory_bytes: system.total_memory(),
                allocations: AllocationStats::current(),
            }
        };
        write_report(file, ResourceKind::Memory, &report)
    }

    fn start_cpu_snapshot(&self, file: File) -> Result<(), SnapshotError> {
        let mut capture = lock(&self.capture);
        if capture.is_some() {
            return Err(SnapshotError::CaptureActive);
        }
        // Resets the usage baseline so the report covers the capture window only
        self.refresh(&mut lock(&self.system));
        *capture = Some(CpuCapture {
            file,
            started_at: Local::now(),
        });
        debug!("Cpu capture started");
        Ok(())
    }

    fn stop_cpu_snapshot(&self) {
        let Some(capture) = lock(&self.capture).take() else {
            debug!("No cpu capture running");
            return;
        };
        if let Err(e) = self.finish_capture(capture) {
            error!("Failed to finish cpu profile: {}", e);
        }
    }

    fn write_stack_snapshot(&self, file: &mut File) -> Result<(), SnapshotError> {
        let os_threads = {
            let mut system = lock(&self.system);
            self.refresh(&mut system);
            system
                .process(self.pid)
                .and_then(|p| p.tasks().map(|tasks| tasks.len()))
        };
        let alive_tasks = tokio::runtime::Handle::try_current()
            .ok()
            .map(|handle| handle.metrics().num_alive_tasks());

        let report = StackReport {
            captured_at: Local::now(),
            pid: self.pid.as_u32(),
            alive_tasks,
            os_threads,
            backtrace: std::backtrace::Backtrace::force_capture().to_string(),
        };
        write_report(file, ResourceKind::Goroutine, &report)
    }
}
