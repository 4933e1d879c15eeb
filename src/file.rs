use crate::lsn::Lsn;
use std::path::{Path, PathBuf};

pub const JOURNAL_EXT: &str = "jlog";
pub const SNAPSHOT_EXT: &str = "snap";
pub const IN_PROGRESS_SUFFIX: &str = ".inprogress";

const LSN_DIGITS: usize = 10;

/// Kind of a data file inside a database directory
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SegmentKind {
    /// Append-only journal segment (`.jlog`)
    Journal,

    /// Snapshot containing one `set` line per live record (`.snap`)
    Snapshot,
}

impl SegmentKind {
    pub fn ext(self) -> &'static str {
        match self {
            Self::Journal => JOURNAL_EXT,
            Self::Snapshot => SNAPSHOT_EXT,
        }
    }
}

/// Formats an LSN as the zero-padded file name prefix.
pub fn format_lsn(lsn: Lsn) -> String {
    format!("{lsn:010}")
}

/// Builds the path of a data file from its LSN floor and kind.
pub fn data_file_path(dir: &Path, lsn: Lsn, kind: SegmentKind) -> PathBuf {
    dir.join(format!("{}.{}", format_lsn(lsn), kind.ext()))
}

/// Parses a data file name of the form `NNNNNNNNNN.jlog` or `NNNNNNNNNN.snap`.
///
/// Anything else (directories, `.inprogress` artifacts, foreign files) yields
/// `None` and is ignored by recovery.
pub fn parse_data_file_name(name: &str) -> Option<(Lsn, SegmentKind)> {
    let (stem, ext) = name.split_once('.')?;

    if stem.len() != LSN_DIGITS || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let kind = match ext {
        JOURNAL_EXT => SegmentKind::Journal,
        SNAPSHOT_EXT => SegmentKind::Snapshot,
        _ => return None,
    };

    let lsn = stem.parse().ok()?;

    Some((lsn, kind))
}

/// Fsyncs a directory so renames and unlinks inside it are durable.
#[allow(clippy::unnecessary_wraps)]
pub fn fsync_folder(path: &Path) -> std::io::Result<()> {
    // NOTE: folder fsync is not a thing on Windows
    #[cfg(not(target_os = "windows"))]
    {
        let folder = std::fs::File::open(path)?;
        folder.sync_all()?;
    }

    #[cfg(target_os = "windows")]
    let _ = path;

    Ok(())
}
