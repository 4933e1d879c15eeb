use super::{
    recovery,
    task::{Ack, Views},
};
use crate::{
    file::{self, SegmentKind, IN_PROGRESS_SUFFIX},
    lsn::Lsn,
    operation::Operation,
};
use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

/// Records per write batch when streaming a snapshot
const BATCH_SIZE: usize = 100;

/// Entry point of the background snapshot thread.
///
/// Runs the dump and reports the outcome on the snapshot request's reply
/// channel; the requester stays blocked until then.
pub(super) fn run(dir: &Path, views: &Views, snap_lsn: Lsn, ack: &Ack<()>) {
    log::info!(
        "Snapshot of {} space(s) up to LSN {snap_lsn} started",
        views.len(),
    );

    let result = dump(dir, views, snap_lsn);

    match &result {
        Ok(()) => log::info!("Snapshot up to LSN {snap_lsn} done"),
        Err(e) => log::error!("Snapshot up to LSN {snap_lsn} failed: {e:?}"),
    }

    let _ = ack.send(result);
}

/// Writes `<snap_lsn>.snap` holding exactly the live records of all views,
/// then deletes the data files it supersedes.
///
/// The file is built under an `.inprogress` name and renamed into place, so
/// recovery never sees a half-written snapshot. On any error the in-progress
/// file is removed and no source file was touched.
fn dump(dir: &Path, views: &Views, snap_lsn: Lsn) -> crate::Result<()> {
    remove_orphans(dir)?;

    let snap_path = file::data_file_path(dir, snap_lsn, SegmentKind::Snapshot);
    let tmp_path = in_progress_path(&snap_path);

    let mut snap = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(&tmp_path)?;

    if let Err(e) = write_views(&mut snap, views).and_then(|()| {
        snap.sync_all()?;
        Ok(())
    }) {
        drop(snap);
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    drop(snap);

    log::debug!(
        "Renaming {} to {}",
        tmp_path.display(),
        snap_path.display(),
    );
    std::fs::rename(&tmp_path, &snap_path)?;
    file::fsync_folder(dir)?;

    // everything below the snapshot's floor is now fully covered by it
    for data_file in recovery::list_data_files(dir)? {
        if data_file.lsn_floor < snap_lsn {
            log::debug!("Removing {}", data_file.path.display());
            std::fs::remove_file(&data_file.path)?;
        }
    }

    Ok(())
}

/// Streams every record of every view as a `set` line, in ascending key
/// order per space, batching writes.
fn write_views(snap: &mut std::fs::File, views: &Views) -> crate::Result<()> {
    let mut buf = Vec::new();
    let mut pending = 0usize;

    for space in views.values() {
        for record in space.iter() {
            let op = Operation::from_record(&record);

            serde_json::to_writer(&mut buf, &op)?;
            buf.push(b'\n');
            pending += 1;

            if pending == BATCH_SIZE {
                snap.write_all(&buf)?;
                buf.clear();
                pending = 0;
            }
        }
    }

    snap.write_all(&buf)?;

    Ok(())
}

/// Removes `*.inprogress` leftovers of snapshots that never completed.
fn remove_orphans(dir: &Path) -> crate::Result<()> {
    for dirent in std::fs::read_dir(dir)? {
        let dirent = dirent?;

        let name = dirent.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        if name.ends_with(IN_PROGRESS_SUFFIX) && dirent.file_type()?.is_file() {
            log::debug!("Removing orphaned {name}");
            std::fs::remove_file(dirent.path())?;
        }
    }

    Ok(())
}

fn in_progress_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(IN_PROGRESS_SUFFIX);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record::Record, space::Space};
    use std::sync::Arc;

    fn view_of(records: &[(&str, u64)]) -> Space {
        let space = Space::detached("users");

        for (key, lsn) in records {
            let value = serde_json::value::to_raw_value(lsn).expect("should serialize");
            let mut record = Record::new("users".into(), key.as_bytes().into(), Some(value));
            record.lsn = *lsn;
            record.time = 1_750_280_676;
            space.install(Arc::new(record));
        }

        space.view()
    }

    #[test]
    fn dump_writes_sorted_set_lines_and_removes_superseded() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        std::fs::write(dir.path().join("0000000001.jlog"), b"")?;
        std::fs::write(dir.path().join("0000000002.snap.inprogress"), b"junk")?;

        let mut views = Views::new();
        views.insert("users".into(), view_of(&[("b", 2), ("a", 1), ("c", 3)]));

        dump(dir.path(), &views, 3)?;

        let snap = std::fs::read_to_string(dir.path().join("0000000003.snap"))?;
        let keys = snap
            .lines()
            .map(|line| {
                let op: Operation = serde_json::from_str(line)?;
                assert_eq!(op.op, crate::OpKind::Set);
                Ok(String::from_utf8_lossy(op.record.key()).into_owned())
            })
            .collect::<crate::Result<Vec<_>>>()?;

        assert_eq!(keys, ["a", "b", "c"]);

        // superseded journal and the orphan are gone
        assert!(!dir.path().join("0000000001.jlog").try_exists()?);
        assert!(!dir.path().join("0000000002.snap.inprogress").try_exists()?);

        Ok(())
    }

    #[test]
    fn dump_preserves_record_lsns() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let mut views = Views::new();
        views.insert("users".into(), view_of(&[("a", 7)]));

        dump(dir.path(), &views, 9)?;

        let snap = std::fs::read_to_string(dir.path().join("0000000009.snap"))?;
        let op: Operation = serde_json::from_str(snap.trim())?;

        assert_eq!(op.lsn, 7);
        assert_eq!(op.time, 1_750_280_676);

        Ok(())
    }
}
