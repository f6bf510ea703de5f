use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Exclusion flag guarding the cpu profiler.
///
/// The scheduler acquires it before a cpu capture starts and the deferred
/// stop task releases it once the profile is written. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct DumpGate {
    cpu_profiling: Arc<AtomicBool>,
}

impl DumpGate {
    pub fn new() -> Self {
        DumpGate {
            cpu_profiling: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if this call took the gate.
    pub fn try_enter_cpu_profile(&self) -> bool {
        self.cpu_profiling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn exit_cpu_profile(&self) {
        self.cpu_profiling.store(false, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.cpu_profiling.load(Ordering::SeqCst)
    }
}
