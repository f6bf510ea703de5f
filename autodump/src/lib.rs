//! In-process agent writing heap, cpu and stack snapshots of its host when
//! memory, cpu or task usage looks abnormal.

pub mod agent;
pub mod alloc;
pub mod init_telemetry;
pub mod metrics;
pub mod sampler;
pub mod scheduler;
pub mod settings;
pub mod sink;
pub mod stop_flag;

pub use agent::{start, StartError};
pub use scheduler::{DumpScheduler, DumpSchedulerHandle, SchedulerStatus, TickOutcome};
