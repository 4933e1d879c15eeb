use crate::{
    file::{self, SegmentKind},
    lsn::Lsn,
    operation::Operation,
};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// A journal segment or snapshot found in the database directory
#[derive(Debug)]
pub(crate) struct DataFile {
    pub path: PathBuf,
    pub lsn_floor: Lsn,
    pub kind: SegmentKind,
}

/// Lists all data files in `dir`, sorted by file name.
///
/// Zero padding makes name order equal numeric LSN order. `.inprogress`
/// artifacts and foreign files are ignored; a missing directory yields an
/// empty list.
pub(crate) fn list_data_files(dir: &Path) -> crate::Result<Vec<DataFile>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();

    for dirent in entries {
        let dirent = dirent?;

        if !dirent.file_type()?.is_file() {
            continue;
        }

        let name = dirent.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if let Some((lsn_floor, kind)) = file::parse_data_file_name(name) {
            files.push(DataFile {
                path: dirent.path(),
                lsn_floor,
                kind,
            });
        }
    }

    files.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    Ok(files)
}

/// Reduces a sorted file list to the set recovery has to replay: the latest
/// snapshot plus every journal segment whose LSN floor is at or above it.
///
/// Journals older than the latest snapshot are fully superseded by it;
/// overlap at the boundary is harmless because replay is idempotent (later
/// same-key entries overwrite earlier ones).
pub(crate) fn select_replay_files(files: Vec<DataFile>) -> Vec<DataFile> {
    let snap_floor = files
        .iter()
        .rev()
        .find(|f| f.kind == SegmentKind::Snapshot)
        .map(|f| f.lsn_floor);

    let Some(snap_floor) = snap_floor else {
        return files;
    };

    files
        .into_iter()
        .filter(|f| match f.kind {
            SegmentKind::Snapshot => f.lsn_floor == snap_floor,
            SegmentKind::Journal => f.lsn_floor >= snap_floor,
        })
        .collect()
}

/// Replays one data file, feeding every operation to `apply`.
///
/// Blank lines are tolerated anywhere; a torn or malformed line is a hard
/// error, refusing to open the database. Operations persisted without an LSN
/// get the next one assigned, otherwise the stored LSN is honored.
pub(crate) fn replay_file(
    path: &Path,
    start_lsn: Lsn,
    apply: &mut dyn FnMut(Operation) -> crate::Result<Lsn>,
) -> crate::Result<Lsn> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut lsn = start_lsn;
    let mut count = 0u64;

    for line in reader.lines() {
        let line = line?;

        if line.trim().is_empty() {
            continue;
        }

        let mut op: Operation = serde_json::from_str(&line)?;

        if op.lsn == 0 {
            op.lsn = lsn + 1;
        }

        lsn = apply(op)?;
        count += 1;
    }

    log::debug!(
        "Replayed {count} operation(s) from {}, LSN now {lsn}",
        path.display(),
    );

    Ok(lsn)
}
