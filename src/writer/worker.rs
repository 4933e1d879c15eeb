use super::{
    snapshot,
    task::{Ack, Task},
};
use crate::{
    file::{self, SegmentKind},
    lsn::{Lsn, LsnCounter},
    operation::{unix_timestamp, Operation},
    Error,
};
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// The journal segment currently receiving writes
pub(super) struct ActiveSegment {
    pub(super) path: PathBuf,
    file: File,
}

impl ActiveSegment {
    /// Creates (or adopts, if empty) the segment whose LSN floor is `floor`.
    pub(super) fn create(dir: &Path, floor: Lsn) -> crate::Result<Self> {
        let path = file::data_file_path(dir, floor, SegmentKind::Journal);

        if let Ok(meta) = std::fs::metadata(&path) {
            // a leftover empty file with the right name is fine to reuse
            if meta.len() > 0 {
                return Err(Error::SegmentExists(path));
            }
        }

        std::fs::create_dir_all(dir)?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        Ok(Self { path, file })
    }

    fn sync(&self) -> crate::Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

/// State owned by the worker thread: the single point of durability
pub(super) struct WorkerContext {
    pub(super) dir: PathBuf,
    pub(super) lsn: LsnCounter,
    pub(super) segment: ActiveSegment,
}

impl WorkerContext {
    /// Appends one operation to the current segment, assigning the next LSN
    /// and the current timestamp to both the operation and its record.
    pub(super) fn write(&mut self, mut op: Operation) -> crate::Result<Operation> {
        let lsn = self.lsn.get() + 1;

        op.lsn = lsn;
        op.time = unix_timestamp();
        op.record.lsn = lsn;
        op.record.time = op.time;

        let mut line = serde_json::to_vec(&op)?;
        line.push(b'\n');

        self.segment.file.write_all(&line)?;

        self.lsn.fetch_max(lsn);

        Ok(op)
    }

    /// Switches writes over to a fresh segment named after the next LSN.
    ///
    /// No-op if the current segment already carries that name. The previous
    /// segment is fsynced and closed only after the new one was opened.
    pub(super) fn rotate(&mut self) -> crate::Result<()> {
        let floor = self.lsn.get() + 1;
        let path = file::data_file_path(&self.dir, floor, SegmentKind::Journal);

        if self.segment.path == path {
            return Ok(());
        }

        let segment = ActiveSegment::create(&self.dir, floor)?;
        self.segment.sync()?;

        log::debug!("Rotating journal to {}", path.display());
        self.segment = segment;

        Ok(())
    }

    /// Final fsync and close of the current segment.
    fn finish(self) -> crate::Result<()> {
        self.segment.sync()
    }
}

/// The writer's worker loop.
///
/// Requests are processed strictly in queue order, which makes LSN
/// assignment, rotation and snapshot scheduling a total order. The loop ends
/// when the last sender is dropped; the queue is drained, the segment synced
/// and the result reported on `done`.
pub(super) fn run(mut ctx: WorkerContext, rx: flume::Receiver<Task>, done: Ack<()>) {
    for task in rx {
        log::trace!("writer: got {task:?}");

        match task {
            Task::Write { op, ack } => {
                let _ = ack.send(ctx.write(op));
            }

            Task::Rotate { ack } => {
                let _ = ack.send(ctx.rotate());
            }

            Task::Snapshot { views, ack } => {
                // rotate first so concurrent writes land in a segment whose
                // LSN floor is above everything the snapshot captures
                if let Err(e) = ctx.rotate() {
                    let _ = ack.send(Err(e));
                    continue;
                }

                let snap_lsn = ctx.lsn.get();
                let dir = ctx.dir.clone();
                let reply = ack.clone();

                let spawned = std::thread::Builder::new()
                    .name("tarn:snapshot".to_string())
                    .spawn(move || snapshot::run(&dir, &views, snap_lsn, &ack));

                if let Err(e) = spawned {
                    log::error!("Failed to spawn snapshot thread: {e:?}");
                    let _ = reply.send(Err(Error::Io(e)));
                }
            }
        }
    }

    log::trace!("writer: exiting because channel was closed");
    let _ = done.send(ctx.finish());
}
