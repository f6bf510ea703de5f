mod profile;

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use autodump_core::{error::SnapshotError, monitor::ResourceKind, snapshot::snapshot_path};
use chrono::{DateTime, Local};
use tracing::warn;

pub use profile::{ProcessProfileWriter, ProfileWriter};

/// Opens timestamped snapshot files in the dump directory and lets the
/// profile writer fill them.
#[derive(Clone)]
pub struct SnapshotSink {
    directory: PathBuf,
    writer: Arc<dyn ProfileWriter>,
}

impl SnapshotSink {
    pub fn new(directory: impl Into<PathBuf>, writer: Arc<dyn ProfileWriter>) -> Self {
        Self {
            directory: directory.into(),
            writer,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn ensure_directory(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.directory)
    }

    fn open(&self, kind: ResourceKind, now: &DateTime<Local>) -> Result<(PathBuf, File), SnapshotError> {
        let path = snapshot_path(&self.directory, kind, now);
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }

        match options.open(&path) {
            Ok(file) => Ok((path, file)),
            Err(source) => Err(SnapshotError::Open { path, source }),
        }
    }

    fn write_with(
        &self,
        kind: ResourceKind,
        now: &DateTime<Local>,
        write: impl FnOnce(&dyn ProfileWriter, &mut File) -> Result<(), SnapshotError>,
    ) -> Result<PathBuf, SnapshotError> {
        let (path, mut file) = self.open(kind, now)?;
        if let Err(e) = write(self.writer.as_ref(), &mut file) {
            drop(file);
            discard(&path);
            return Err(e);
        }
        Ok(path)
    }

    pub fn write_heap(&self, now: &DateTime<Local>) -> Result<PathBuf, SnapshotError> {
        self.write_with(ResourceKind::Memory, now, |writer, file| {
            writer.write_heap_snapshot(file)
        })
    }

    pub fn write_goroutine(&self, now: &DateTime<Local>) -> Result<PathBuf, SnapshotError> {
        self.write_with(ResourceKind::Goroutine, now, |writer, file| {
            writer.write_stack_snapshot(file)
        })
    }

    /// Open the cpu snapshot file and start recording into it. The capture
    /// keeps running until [`SnapshotSink::stop_cpu`].
    pub fn start_cpu(&self, now: &DateTime<Local>) -> Result<PathBuf, SnapshotError> {
        let (path, file) = self.open(ResourceKind::Cpu, now)?;
        if let Err(e) = self.writer.start_cpu_snapshot(file) {
            // a running capture may own a file of the same name
            if !matches!(e, SnapshotError::CaptureActive) {
                discard(&path);
            }
            return Err(e);
        }
        Ok(path)
    }

    pub fn stop_cpu(&self) {
        self.writer.stop_cpu_snapshot();
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove incomplete snapshot {}: {}", path.display(), e);
    }
}
