use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::monitor::ResourceKind;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Path of the snapshot for `kind` taken at `now`: `<dir>/<kind>.dump_<YYYYMMDDHHMMSS>`.
///
/// Two snapshots of the same kind within one second share a name.
pub fn snapshot_path(directory: &Path, kind: ResourceKind, now: &DateTime<Local>) -> PathBuf {
    directory.join(format!(
        "{}.dump_{}",
        kind.snapshot_name(),
        now.format(TIMESTAMP_FORMAT)
    ))
}
