use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use autodump_core::error::{SampleError, SettingsError};
use autodump_core::settings::dump::DumpSettings;
use thiserror::Error;
use tracing::info;

use crate::sampler::SystemSampler;
use crate::scheduler::{DumpScheduler, DumpSchedulerHandle};
use crate::sink::ProcessProfileWriter;

static STARTED: AtomicBool = AtomicBool::new(false);

#[derive(Error, Debug)]
pub enum StartError {
    #[error("autodump is already running in this process")]
    AlreadyStarted,
    #[error("autodump must be started from within a tokio runtime")]
    NoRuntime,
    #[error("Invalid dump settings: {0}")]
    InvalidSettings(#[from] SettingsError),
    #[error("Failed to set up resource sampling: {0}")]
    Sampler(#[from] SampleError),
}

/// Start the dump scheduler for the current process.
///
/// Only the first successful call spawns a scheduler, later calls fail with
/// [`StartError::AlreadyStarted`] even after the first one was shut down.
pub fn start(settings: DumpSettings) -> Result<DumpSchedulerHandle, StartError> {
    settings.validate()?;
    tokio::runtime::Handle::try_current().map_err(|_| StartError::NoRuntime)?;

    if STARTED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(StartError::AlreadyStarted);
    }

    let scheduler = match build_scheduler(settings) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            STARTED.store(false, Ordering::SeqCst);
            return Err(e);
        }
    };

    info!("Starting autodump {}", env!("CARGO_PKG_VERSION"));
    Ok(scheduler.spawn())
}

fn build_scheduler(settings: DumpSettings) -> Result<DumpScheduler, StartError> {
    let sampler = SystemSampler::new()?;
    let writer = ProcessProfileWriter::new()?;
    Ok(DumpScheduler::new(
        settings,
        Box::new(sampler),
        Arc::new(writer),
    )?)
}
