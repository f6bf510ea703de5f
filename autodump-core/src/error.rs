//! Error types for sampling, snapshot writing and settings validation.
//!
//! None of these ever stop the dump scheduler. They are reported through
//! `tracing` and the affected resource is skipped for the current tick.

use std::path::PathBuf;

use crate::monitor::ResourceKind;

/// Failure while reading a resource metric from the host.
#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    /// The current process could not be identified
    #[error("Failed to get current pid: {0}")]
    Pid(String),

    /// The process vanished from the process table between refreshes
    #[error("Process information unavailable for pid {0}")]
    ProcessUnavailable(u32),

    /// The host reported no total memory, a percentage cannot be computed
    #[error("Total memory is unknown")]
    TotalMemoryUnknown,

    /// Allocation counters are only available with the counting allocator installed
    #[error("Allocation tracking is not enabled, install autodump::alloc::CountingAllocator as global allocator")]
    AllocationTrackingDisabled,
}

/// Failure while creating or writing a snapshot file.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to open snapshot file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {kind} snapshot: {source}")]
    Write {
        kind: ResourceKind,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode {kind} snapshot: {message}")]
    Encode { kind: ResourceKind, message: String },

    /// Another cpu capture is still running
    #[error("A cpu profile capture is already active")]
    CaptureActive,
}

impl SnapshotError {
    pub fn write(kind: ResourceKind, source: std::io::Error) -> Self {
        Self::Write { kind, source }
    }

    pub fn encode(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::Encode {
            kind,
            message: message.into(),
        }
    }
}

/// Rejected dump settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Dump settings error: {0}")]
    Invalid(String),

    #[error("Invalid interval '{value}': {reason}")]
    Interval { value: String, reason: String },
}
