//! The dump scheduler: a fixed tick loop evaluating memory, cpu and task
//! usage of the host and writing snapshots when a monitor fires.

use std::path::Path;
use std::sync::Arc;

use autodump_core::{
    budget::DumpBudget,
    error::{SettingsError, SnapshotError},
    gate::DumpGate,
    monitor::{ResourceKind, ResourceMonitor, TriggerRule},
    settings::dump::DumpSettings,
    window::Sample,
};
use chrono::{DateTime, Local};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::metrics;
use crate::sampler::ResourceSampler;
use crate::sink::{ProfileWriter, SnapshotSink};
use crate::stop_flag::StopFlag;

/// Result of a single scheduler tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A cpu profile is being recorded, nothing was sampled
    Busy,
    /// The daily dump budget is used up, nothing was sampled
    BudgetExhausted,
    /// All resources were evaluated, `fired` lists the snapshots written
    Evaluated { fired: Vec<ResourceKind> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerStatus {
    pub dumps_today: u32,
    pub last_dump_at: Option<DateTime<Local>>,
    pub cpu_profiling: bool,
}

pub struct DumpScheduler {
    settings: DumpSettings,
    sampler: Box<dyn ResourceSampler>,
    sink: SnapshotSink,
    gate: DumpGate,
    budget: DumpBudget,
    memory: ResourceMonitor<u32>,
    cpu: ResourceMonitor<u32>,
    goroutine: ResourceMonitor<usize>,
    last_dump_at: Option<DateTime<Local>>,
    /// When the running cpu capture is due to stop
    cpu_stop_at: Option<Instant>,
    status_tx: watch::Sender<SchedulerStatus>,
}

impl DumpScheduler {
    pub fn new(
        settings: DumpSettings,
        sampler: Box<dyn ResourceSampler>,
        writer: Arc<dyn ProfileWriter>,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;

        let now = Local::now();
        let memory = monitor(&settings, ResourceKind::Memory, TriggerRule::IntervalOnly);
        let cpu = monitor(&settings, ResourceKind::Cpu, TriggerRule::IntervalOnly);
        let goroutine = monitor(
            &settings,
            ResourceKind::Goroutine,
            TriggerRule::SpikeRatio(settings.task_spike_ratio),
        );
        let budget = DumpBudget::new(settings.max_dumps_per_day, settings.budget_policy, now);
        let (status_tx, _) = watch::channel(SchedulerStatus {
            dumps_today: 0,
            last_dump_at: None,
            cpu_profiling: false,
        });

        Ok(Self {
            sink: SnapshotSink::new(settings.dump_directory.clone(), writer),
            settings,
            sampler,
            gate: DumpGate::new(),
            budget,
            memory,
            cpu,
            goroutine,
            last_dump_at: None,
            cpu_stop_at: None,
            status_tx,
        })
    }

    pub fn gate(&self) -> DumpGate {
        self.gate.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            dumps_today: self.budget.dumps_today(),
            last_dump_at: self.last_dump_at,
            cpu_profiling: self.gate.is_busy(),
        }
    }

    /// Run one scheduler cycle for the wall clock time `now`.
    ///
    /// A cpu capture past its deadline is finished first. Resources are then
    /// evaluated in the fixed order memory, cpu, goroutine. Each snapshot
    /// written counts against the daily budget on its own.
    #[instrument(level = "debug", skip_all)]
    pub fn tick_at(&mut self, now: DateTime<Local>) -> TickOutcome {
        self.finish_due_capture();
        let outcome = self.evaluate(now);
        self.status_tx.send_replace(self.status());
        outcome
    }

    fn evaluate(&mut self, now: DateTime<Local>) -> TickOutcome {
        if self.gate.is_busy() {
            debug!("Cpu profile in progress, skipping tick");
            metrics().record_tick_skipped("busy");
            return TickOutcome::Busy;
        }

        if self.budget.is_exhausted(now) {
            debug!(
                "Dump budget for {} exhausted ({} dumps), skipping tick",
                self.budget.day_key(),
                self.budget.dumps_today()
            );
            metrics().record_tick_skipped("budget");
            return TickOutcome::BudgetExhausted;
        }

        let mut fired = Vec::new();
        if self.evaluate_memory(now) {
            fired.push(ResourceKind::Memory);
        }
        if self.evaluate_cpu(now) {
            fired.push(ResourceKind::Cpu);
        }
        if self.evaluate_goroutine(now) {
            fired.push(ResourceKind::Goroutine);
        }
        TickOutcome::Evaluated { fired }
    }

    fn evaluate_memory(&mut self, now: DateTime<Local>) -> bool {
        let percent = match self.sampler.memory_percent() {
            Ok(percent) => percent,
            Err(e) => {
                warn!("Skipping memory evaluation: {}", e);
                return false;
            }
        };
        metrics().record_resource_sample(ResourceKind::Memory, percent);

        let decision = self.memory.decide(now, percent.round() as u32);
        if !decision.fire || !self.reserve(ResourceKind::Memory, now) {
            return false;
        }

        match self.sampler.allocation_stats() {
            Ok(stats) => info!(
                "Memory stats: allocated={}B/{} freed={}B/{} in use={}B/{}",
                stats.allocated_bytes,
                stats.allocated_objects,
                stats.freed_bytes,
                stats.freed_objects,
                stats.in_use_bytes,
                stats.in_use_objects
            ),
            Err(e) => debug!("No allocation stats: {}", e),
        }

        match self.sink.write_heap(&now) {
            Ok(path) => {
                self.memory.mark_dumped(now);
                self.dump_written(ResourceKind::Memory, &path, now);
                true
            }
            Err(e) => {
                self.dump_failed(ResourceKind::Memory, e);
                false
            }
        }
    }

    fn evaluate_cpu(&mut self, now: DateTime<Local>) -> bool {
        let percent = match self.sampler.cpu_percent() {
            Ok(percent) => percent,
            Err(e) => {
                warn!("Skipping cpu evaluation: {}", e);
                return false;
            }
        };
        metrics().record_resource_sample(ResourceKind::Cpu, percent);

        let decision = self.cpu.decide(now, percent.round() as u32);
        if !decision.fire {
            return false;
        }
        if !self.gate.try_enter_cpu_profile() {
            debug!("Cpu profiler already taken");
            return false;
        }
        if !self.reserve(ResourceKind::Cpu, now) {
            self.gate.exit_cpu_profile();
            return false;
        }

        match self.sink.start_cpu(&now) {
            Ok(path) => {
                self.cpu.mark_dumped(now);
                self.arm_cpu_stop();
                self.dump_written(ResourceKind::Cpu, &path, now);
                true
            }
            Err(e) => {
                self.gate.exit_cpu_profile();
                self.dump_failed(ResourceKind::Cpu, e);
                false
            }
        }
    }

    fn evaluate_goroutine(&mut self, now: DateTime<Local>) -> bool {
        let count = self.sampler.task_count();
        metrics().record_resource_sample(ResourceKind::Goroutine, count as f64);

        let decision = self.goroutine.decide(now, count);
        if !decision.fire {
            return false;
        }
        debug!(
            "Task count {} above {:.2} times average {:.2}",
            count, self.settings.task_spike_ratio, decision.average
        );
        if !self.reserve(ResourceKind::Goroutine, now) {
            return false;
        }

        match self.sink.write_goroutine(&now) {
            Ok(path) => {
                self.goroutine.mark_dumped(now);
                self.dump_written(ResourceKind::Goroutine, &path, now);
                true
            }
            Err(e) => {
                self.dump_failed(ResourceKind::Goroutine, e);
                false
            }
        }
    }

    fn reserve(&mut self, kind: ResourceKind, now: DateTime<Local>) -> bool {
        if self.budget.try_reserve(now) {
            return true;
        }
        debug!("Daily dump budget denied {} snapshot", kind);
        metrics().record_dump_rejected(kind);
        false
    }

    fn dump_written(&mut self, kind: ResourceKind, path: &Path, now: DateTime<Local>) {
        self.last_dump_at = Some(now);
        info!(path = %path.display(), "dump {}", kind.log_tag());
        metrics().record_dump_written(kind);
        metrics().record_dumps_today(self.budget.dumps_today());
    }

    fn dump_failed(&mut self, kind: ResourceKind, e: SnapshotError) {
        self.budget.release();
        error!("Failed to write {} snapshot: {}", kind, e);
        metrics().record_dump_failed(kind);
    }

    /// The capture keeps recording while the loop continues ticking. The
    /// loop stops it once `cpu_profile_duration` has passed; no task is
    /// spawned, so the live task count only ever sees the host's tasks.
    fn arm_cpu_stop(&mut self) {
        self.cpu_stop_at = Some(Instant::now() + self.settings.cpu_profile_duration.as_duration());
    }

    /// Finish the running cpu capture if its deadline has passed and free
    /// the gate. Returns whether a capture was finished.
    pub fn finish_due_capture(&mut self) -> bool {
        match self.cpu_stop_at {
            Some(at) if Instant::now() >= at => {
                self.cpu_stop_at = None;
                finish_cpu_capture(&self.sink, &self.gate);
                true
            }
            _ => false,
        }
    }

    /// Stop a capture that is still recording instead of waiting for its deadline.
    fn finish_pending_capture(&mut self) {
        if self.cpu_stop_at.take().is_some() {
            info!("Finishing running cpu profile early");
            finish_cpu_capture(&self.sink, &self.gate);
        }
    }

    /// Start the tick loop on the current tokio runtime.
    pub fn spawn(self) -> DumpSchedulerHandle {
        if self.settings.create_directory {
            if let Err(e) = self.sink.ensure_directory() {
                warn!(
                    "Failed to create dump directory {}: {}",
                    self.sink.directory().display(),
                    e
                );
            }
        }

        let stop_flag = StopFlag::new();
        let gate = self.gate.clone();
        let status = self.status_tx.subscribe();
        let handle = tokio::spawn({
            let stop_flag = stop_flag.clone();
            async move { self.run(stop_flag).await }
        });

        DumpSchedulerHandle {
            stop_flag,
            gate,
            status,
            handle,
        }
    }

    async fn run(mut self, stop_flag: StopFlag) {
        let period = self.settings.tick_interval.as_duration();
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Dump scheduler started: directory={}, tick={}, max dumps per day={} ({:?})",
            self.sink.directory().display(),
            self.settings.tick_interval,
            self.settings.max_dumps_per_day,
            self.settings.budget_policy
        );

        loop {
            let cpu_stop_at = self.cpu_stop_at;
            tokio::select! {
                _ = stop_flag.wait() => break,
                _ = interval.tick() => {
                    self.tick_at(Local::now());
                }
                _ = tokio::time::sleep_until(cpu_stop_at.unwrap_or_else(Instant::now)), if cpu_stop_at.is_some() => {
                    if self.finish_due_capture() {
                        self.status_tx.send_replace(self.status());
                    }
                }
            }
        }

        self.finish_pending_capture();
        self.status_tx.send_replace(self.status());
        info!("Dump scheduler stopped");
    }
}

fn monitor<T: Sample>(settings: &DumpSettings, kind: ResourceKind, rule: TriggerRule) -> ResourceMonitor<T> {
    ResourceMonitor::new(
        kind,
        settings.window_size,
        settings.thresholds.for_kind(kind).into(),
        rule,
    )
}

fn finish_cpu_capture(sink: &SnapshotSink, gate: &DumpGate) {
    sink.stop_cpu();
    gate.exit_cpu_profile();
    debug!("Cpu profile finished");
}

/// Handle to a running dump scheduler.
pub struct DumpSchedulerHandle {
    stop_flag: StopFlag,
    gate: DumpGate,
    status: watch::Receiver<SchedulerStatus>,
    handle: JoinHandle<()>,
}

impl DumpSchedulerHandle {
    /// Stopping this flag stops the scheduler, e.g. from a signal handler.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop_flag.clone()
    }

    /// Status after the latest tick.
    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }

    pub fn cpu_profiling(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait until the scheduler stopped through its stop flag.
    pub async fn wait(self) -> anyhow::Result<()> {
        self.handle.await?;
        Ok(())
    }

    /// Stop the loop and finish a cpu profile that is still recording.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.stop_flag.stop();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autodump_core::budget::BudgetPolicy;
    use autodump_core::error::SampleError;
    use autodump_core::settings::interval::DumpInterval;
    use chrono::{Duration, TimeZone};
    use std::collections::VecDeque;
    use std::fs::{self, File};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeState {
        memory: Option<f64>,
        cpu: Option<f64>,
        tasks: VecDeque<usize>,
        samples_taken: usize,
    }

    #[derive(Clone, Default)]
    struct FakeSampler(Arc<Mutex<FakeState>>);

    impl FakeSampler {
        fn with(memory: Option<f64>, cpu: Option<f64>, tasks: &[usize]) -> Self {
            Self(Arc::new(Mutex::new(FakeState {
                memory,
                cpu,
                tasks: tasks.iter().copied().collect(),
                samples_taken: 0,
            })))
        }

        fn samples_taken(&self) -> usize {
            self.0.lock().unwrap().samples_taken
        }

        fn set_cpu(&self, cpu: Option<f64>) {
            self.0.lock().unwrap().cpu = cpu;
        }
    }

    impl ResourceSampler for FakeSampler {
        fn memory_percent(&mut self) -> Result<f64, SampleError> {
            let mut state = self.0.lock().unwrap();
            state.samples_taken += 1;
            state.memory.ok_or(SampleError::TotalMemoryUnknown)
        }

        fn allocation_stats(
            &mut self,
        ) -> Result<crate::alloc::AllocationStats, SampleError> {
            Err(SampleError::AllocationTrackingDisabled)
        }

        fn cpu_percent(&mut self) -> Result<f64, SampleError> {
            let mut state = self.0.lock().unwrap();
            state.samples_taken += 1;
            state.cpu.ok_or(SampleError::ProcessUnavailable(0))
        }

        fn task_count(&mut self) -> usize {
            let mut state = self.0.lock().unwrap();
            state.samples_taken += 1;
            if state.tasks.len() > 1 {
                state.tasks.pop_front().unwrap_or(1)
            } else {
                state.tasks.front().copied().unwrap_or(1)
            }
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        heap: AtomicUsize,
        stack: AtomicUsize,
        cpu_started: AtomicUsize,
        cpu_stopped: AtomicUsize,
        fail_cpu_start: bool,
        capture: Mutex<Option<File>>,
    }

    impl ProfileWriter for RecordingWriter {
        fn write_heap_snapshot(&self, file: &mut File) -> Result<(), SnapshotError> {
            self.heap.fetch_add(1, Ordering::SeqCst);
            file.write_all(b"heap")
                .map_err(|e| SnapshotError::write(ResourceKind::Memory, e))
        }

        fn start_cpu_snapshot(&self, file: File) -> Result<(), SnapshotError> {
            if self.fail_cpu_start {
                return Err(SnapshotError::encode(ResourceKind::Cpu, "profiler unavailable"));
            }
            self.cpu_started.fetch_add(1, Ordering::SeqCst);
            *self.capture.lock().unwrap() = Some(file);
            Ok(())
        }

        fn stop_cpu_snapshot(&self) {
            if let Some(mut file) = self.capture.lock().unwrap().take() {
                file.write_all(b"cpu").unwrap();
                self.cpu_stopped.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn write_stack_snapshot(&self, file: &mut File) -> Result<(), SnapshotError> {
            self.stack.fetch_add(1, Ordering::SeqCst);
            file.write_all(b"stack")
                .map_err(|e| SnapshotError::write(ResourceKind::Goroutine, e))
        }
    }

    fn settings(dir: &Path) -> DumpSettings {
        let mut settings = DumpSettings {
            dump_directory: dir.to_path_buf(),
            ..Default::default()
        };
        settings.thresholds.memory = DumpInterval::Seconds(0);
        settings.thresholds.cpu = DumpInterval::Seconds(0);
        settings.thresholds.goroutine = DumpInterval::Seconds(0);
        settings
    }

    fn scheduler(
        settings: DumpSettings,
        sampler: &FakeSampler,
        writer: &Arc<RecordingWriter>,
    ) -> DumpScheduler {
        DumpScheduler::new(settings, Box::new(sampler.clone()), writer.clone()).unwrap()
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 14, 12, 0, 0).unwrap()
    }

    fn dump_files(dir: &Path, prefix: &str) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(prefix))
            .count()
    }

    #[test]
    fn test_memory_checkpoint_writes_heap_file() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(Some(12.4), None, &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        let outcome = scheduler.tick_at(t0());
        assert_eq!(
            outcome,
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Memory]
            }
        );
        assert!(dir.path().join("heap.dump_20240314120000").exists());

        let status = scheduler.status();
        assert_eq!(status.dumps_today, 1);
        assert_eq!(status.last_dump_at, Some(t0()));
        assert_eq!(scheduler.memory.window().latest(), Some(12));
    }

    #[test]
    fn test_strict_budget_allows_single_dump() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(Some(50.0), None, &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.max_dumps_per_day = 1;
        settings.budget_policy = BudgetPolicy::Strict;
        let mut scheduler = scheduler(settings, &sampler, &writer);

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Memory]
            }
        );
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(5)),
            TickOutcome::BudgetExhausted
        );
        assert_eq!(dump_files(dir.path(), "heap.dump_"), 1);
        assert_eq!(writer.heap.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.status().dumps_today, 1);
    }

    #[test]
    fn test_budget_rejects_due_dump_within_tick() {
        let dir = tempfile::tempdir().unwrap();
        // memory and goroutine are both due in the second tick
        let sampler = FakeSampler::with(None, None, &[10, 40]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.max_dumps_per_day = 1;
        settings.budget_policy = BudgetPolicy::Strict;
        let mut scheduler = scheduler(settings, &sampler, &writer);

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated { fired: vec![] }
        );
        sampler.0.lock().unwrap().memory = Some(30.0);
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(5)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Memory]
            }
        );
        assert_eq!(writer.stack.load(Ordering::SeqCst), 0);
        assert_eq!(dump_files(dir.path(), "goroutine.dump_"), 0);
        assert!(scheduler.goroutine.last_dump_at().is_none());
    }

    #[test]
    fn test_legacy_budget_admits_one_extra_dump() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(Some(50.0), None, &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.max_dumps_per_day = 1;
        let mut scheduler = scheduler(settings, &sampler, &writer);

        for i in 0..2 {
            assert_eq!(
                scheduler.tick_at(t0() + Duration::seconds(5 * i)),
                TickOutcome::Evaluated {
                    fired: vec![ResourceKind::Memory]
                }
            );
        }
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(10)),
            TickOutcome::BudgetExhausted
        );
        assert_eq!(dump_files(dir.path(), "heap.dump_"), 2);
    }

    #[test]
    fn test_budget_resets_on_new_day() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(Some(50.0), None, &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.max_dumps_per_day = 1;
        settings.budget_policy = BudgetPolicy::Strict;
        let mut scheduler = scheduler(settings, &sampler, &writer);

        scheduler.tick_at(t0());
        assert_eq!(
            scheduler.tick_at(t0() + Duration::hours(1)),
            TickOutcome::BudgetExhausted
        );
        assert_eq!(
            scheduler.tick_at(t0() + Duration::days(1)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Memory]
            }
        );
        assert_eq!(dump_files(dir.path(), "heap.dump_"), 2);
    }

    #[test]
    fn test_write_failure_consumes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not-there");
        let sampler = FakeSampler::with(Some(50.0), None, &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(&missing), &sampler, &writer);

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated { fired: vec![] }
        );
        assert_eq!(scheduler.status().dumps_today, 0);
        assert!(scheduler.memory.last_dump_at().is_none());

        fs::create_dir(&missing).unwrap();
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(5)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Memory]
            }
        );
    }

    #[test]
    fn test_sampling_failure_skips_only_that_resource() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, None, &[10, 10, 10, 10, 14]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        for i in 0..4 {
            assert_eq!(
                scheduler.tick_at(t0() + Duration::seconds(5 * i)),
                TickOutcome::Evaluated { fired: vec![] }
            );
        }
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(20)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Goroutine]
            }
        );
        assert_eq!(writer.stack.load(Ordering::SeqCst), 1);
        assert_eq!(writer.heap.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_task_count_below_spike_ratio_does_not_dump() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, None, &[10, 10, 10, 10, 13]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        for i in 0..5 {
            assert_eq!(
                scheduler.tick_at(t0() + Duration::seconds(5 * i)),
                TickOutcome::Evaluated { fired: vec![] }
            );
        }
        assert_eq!(writer.stack.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_resources_fire_in_one_tick() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(Some(50.0), None, &[10, 10, 10, 10, 40]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        for i in 0..4 {
            scheduler.tick_at(t0() + Duration::seconds(5 * i));
        }
        sampler.set_cpu(Some(90.0));
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(20)),
            TickOutcome::Evaluated {
                fired: vec![
                    ResourceKind::Memory,
                    ResourceKind::Cpu,
                    ResourceKind::Goroutine
                ]
            }
        );
        // four heap dumps before, three snapshots now
        assert_eq!(scheduler.status().dumps_today, 7);
        assert!(scheduler.status().cpu_profiling);
        scheduler.finish_pending_capture();
        assert!(!scheduler.gate().is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cpu_capture_blocks_ticks_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);
        let gate = scheduler.gate();

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Cpu]
            }
        );
        assert!(gate.is_busy());
        let samples = sampler.samples_taken();

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(5)),
            TickOutcome::Busy
        );
        assert_eq!(sampler.samples_taken(), samples);
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 0);

        // the tick at the deadline finishes the capture and evaluates again
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(10)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Cpu]
            }
        );
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 1);
        let cpu_file = dir.path().join("cpu.dump_20240314120000");
        assert_eq!(fs::read_to_string(cpu_file).unwrap(), "cpu");
        assert!(sampler.samples_taken() > samples);
        scheduler.finish_pending_capture();
    }

    #[tokio::test]
    async fn test_cpu_start_failure_releases_gate_and_budget() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter {
            fail_cpu_start: true,
            ..Default::default()
        });
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated { fired: vec![] }
        );
        assert!(!scheduler.gate().is_busy());
        assert_eq!(scheduler.status().dumps_today, 0);
        assert!(scheduler.cpu.last_dump_at().is_none());
        assert_eq!(dump_files(dir.path(), "cpu.dump_"), 0);
    }

    #[tokio::test]
    async fn test_cpu_not_started_while_gate_taken() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut scheduler = scheduler(settings(dir.path()), &sampler, &writer);

        // the gate is taken between the busy check and the cpu evaluation
        assert!(scheduler.gate().try_enter_cpu_profile());
        assert!(!scheduler.evaluate_cpu(t0()));
        assert!(scheduler.cpu.last_dump_at().is_none());
        assert_eq!(writer.cpu_started.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_ticks_and_shuts_down() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(&dir.path().join("dumps"));
        settings.tick_interval = DumpInterval::Seconds(5);
        settings.cpu_profile_duration = DumpInterval::Seconds(10);
        let handle = scheduler(settings, &sampler, &writer).spawn();

        assert!(dir.path().join("dumps").is_dir());
        assert_eq!(sampler.samples_taken(), 0);

        // first tick fires after one period and starts a cpu capture
        tokio::time::sleep(std::time::Duration::from_secs(6)).await;
        assert_eq!(writer.cpu_started.load(Ordering::SeqCst), 1);
        assert!(handle.cpu_profiling());
        assert_eq!(handle.status().dumps_today, 1);

        handle.shutdown().await.unwrap();
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 1);
        assert!(writer.capture.lock().unwrap().is_none());
    }
    #[test]
    fn test_tick_without_runtime_finishes_capture_on_later_tick() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.cpu_profile_duration = DumpInterval::Seconds(0);
        let mut scheduler = scheduler(settings, &sampler, &writer);

        assert_eq!(
            scheduler.tick_at(t0()),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Cpu]
            }
        );
        assert!(scheduler.gate().is_busy());

        assert_eq!(
            scheduler.tick_at(t0() + Duration::seconds(5)),
            TickOutcome::Evaluated {
                fired: vec![ResourceKind::Cpu]
            }
        );
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(writer.cpu_started.load(Ordering::SeqCst), 2);

        scheduler.finish_pending_capture();
        assert!(!scheduler.gate().is_busy());
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_stops_capture_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = FakeSampler::with(None, Some(80.0), &[5]);
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.tick_interval = DumpInterval::Seconds(5);
        settings.cpu_profile_duration = DumpInterval::Seconds(2);
        let handle = scheduler(settings, &sampler, &writer).spawn();

        tokio::time::sleep(std::time::Duration::from_secs(6)).await;
        assert!(handle.cpu_profiling());

        // stopped at 7s, before the next tick at 10s
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(!handle.cpu_profiling());
        assert!(!handle.status().cpu_profiling);
        assert_eq!(writer.cpu_stopped.load(Ordering::SeqCst), 1);
        assert_eq!(writer.cpu_started.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
    }

    /// Memory is unavailable, cpu is always due and the task count is read
    /// from the runtime the scheduler runs on.
    struct RuntimeTaskSampler;

    impl ResourceSampler for RuntimeTaskSampler {
        fn memory_percent(&mut self) -> Result<f64, SampleError> {
            Err(SampleError::TotalMemoryUnknown)
        }

        fn allocation_stats(
            &mut self,
        ) -> Result<crate::alloc::AllocationStats, SampleError> {
            Err(SampleError::AllocationTrackingDisabled)
        }

        fn cpu_percent(&mut self) -> Result<f64, SampleError> {
            Ok(80.0)
        }

        fn task_count(&mut self) -> usize {
            tokio::runtime::Handle::current().metrics().num_alive_tasks()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cpu_capture_does_not_count_as_task_spike() {
        let dir = tempfile::tempdir().unwrap();
        let writer = Arc::new(RecordingWriter::default());
        let mut settings = settings(dir.path());
        settings.tick_interval = DumpInterval::Seconds(2);
        settings.cpu_profile_duration = DumpInterval::Seconds(1);
        let handle = DumpScheduler::new(settings, Box::new(RuntimeTaskSampler), writer.clone())
            .unwrap()
            .spawn();

        tokio::time::sleep(std::time::Duration::from_secs(13)).await;
        handle.shutdown().await.unwrap();

        assert!(writer.cpu_started.load(Ordering::SeqCst) >= 5);
        assert_eq!(writer.stack.load(Ordering::SeqCst), 0);
        assert_eq!(dump_files(dir.path(), "goroutine.dump_"), 0);
    }
}
