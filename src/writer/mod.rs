mod recovery;
mod snapshot;
pub(crate) mod task;
mod worker;

use crate::{
    lsn::{Lsn, LsnCounter},
    operation::Operation,
    Error,
};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex, RwLock},
};
use task::{Task, Views};
use worker::{ActiveSegment, WorkerContext};

/// Lifecycle state of the writer
///
/// `created -> loaded (load) -> running (start) -> closed (close)`; any
/// request outside this order fails with [`Error::InvalidState`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    /// Constructed, nothing replayed yet
    Created,

    /// Directory replayed, worker not running yet
    Loaded,

    /// Worker loop is serving requests
    Running,

    /// Terminal state
    Closed,
}

pub(crate) struct WriterInner {
    dir: PathBuf,

    /// Highest durable LSN; shared with the worker thread
    lsn: LsnCounter,

    status: Mutex<Status>,

    /// Present while running; dropping it lets the worker drain and exit
    tx: RwLock<Option<flume::Sender<Task>>>,

    /// Worker's final flush result, consumed by `close`
    done: Mutex<Option<flume::Receiver<crate::Result<()>>>>,

    queue_size: usize,
}

/// The single point of durability
///
/// All mutating file I/O is funnelled through one background worker fed by a
/// bounded request queue, so LSN assignment, file rotation and snapshot
/// scheduling form a total order. Handles are cheap to clone and shared by
/// every space of a database.
#[derive(Clone)]
pub(crate) struct Writer(Arc<WriterInner>);

impl std::ops::Deref for Writer {
    type Target = WriterInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Writer {
    pub(crate) fn new<P: Into<PathBuf>>(dir: P, queue_size: usize) -> Self {
        Self(Arc::new(WriterInner {
            dir: dir.into(),
            lsn: LsnCounter::default(),
            status: Mutex::new(Status::Created),
            tx: RwLock::new(None),
            done: Mutex::new(None),
            queue_size,
        }))
    }

    /// Current LSN (0 before anything was written or replayed)
    pub(crate) fn lsn(&self) -> Lsn {
        self.lsn.get()
    }

    /// Replays the directory into `apply`, one operation at a time.
    ///
    /// Selects the latest snapshot plus all journal segments at or above its
    /// LSN floor, replays them in LSN order and advances the writer's LSN to
    /// the highest one observed. Must be called exactly once, before `start`.
    pub(crate) fn load(
        &self,
        apply: &mut dyn FnMut(Operation) -> crate::Result<Lsn>,
    ) -> crate::Result<()> {
        let mut status = self.status.lock().expect("lock is poisoned");

        if *status != Status::Created {
            return Err(Error::InvalidState {
                expected: Status::Created,
                actual: *status,
            });
        }

        let files = recovery::select_replay_files(recovery::list_data_files(&self.dir)?);

        for file in files {
            let lsn = recovery::replay_file(&file.path, self.lsn.get(), apply)?;
            self.lsn.fetch_max(lsn);
        }

        *status = Status::Loaded;

        Ok(())
    }

    /// Rotates to a fresh journal segment and starts the worker loop.
    pub(crate) fn start(&self) -> crate::Result<()> {
        let mut status = self.status.lock().expect("lock is poisoned");

        if *status != Status::Loaded {
            return Err(Error::InvalidState {
                expected: Status::Loaded,
                actual: *status,
            });
        }

        let segment = ActiveSegment::create(&self.dir, self.lsn.get() + 1)?;
        log::debug!("Journal starts at {}", segment.path.display());

        let ctx = WorkerContext {
            dir: self.dir.clone(),
            lsn: self.lsn.clone(),
            segment,
        };

        let (tx, rx) = flume::bounded(self.queue_size);
        let (done_tx, done_rx) = flume::bounded(1);

        std::thread::Builder::new()
            .name("tarn:writer".to_string())
            .spawn(move || worker::run(ctx, rx, done_tx))?;

        *self.tx.write().expect("lock is poisoned") = Some(tx);
        *self.done.lock().expect("lock is poisoned") = Some(done_rx);
        *status = Status::Running;

        Ok(())
    }

    /// Appends `op` to the journal; blocks until it is durable.
    ///
    /// The returned operation carries the assigned LSN and timestamp, both
    /// on itself and on its record.
    pub(crate) fn write(&self, op: Operation) -> crate::Result<Operation> {
        let (ack, reply) = flume::bounded(1);
        self.dispatch(Task::Write { op, ack })?;
        reply.recv().map_err(|_| Error::Closed)?
    }

    /// Rotates the current journal segment; blocks until done.
    pub(crate) fn rotate(&self) -> crate::Result<()> {
        let (ack, reply) = flume::bounded(1);
        self.dispatch(Task::Rotate { ack })?;
        reply.recv().map_err(|_| Error::Closed)?
    }

    /// Schedules a snapshot of `views`; blocks until the background dump
    /// finished (or failed).
    pub(crate) fn snapshot(&self, views: Views) -> crate::Result<()> {
        let (ack, reply) = flume::bounded(1);
        self.dispatch(Task::Snapshot { views, ack })?;
        reply.recv().map_err(|_| Error::Closed)?
    }

    /// Closes the request queue, waits for the worker to drain it and to
    /// fsync+close the current segment, and returns any flush error.
    pub(crate) fn close(&self) -> crate::Result<()> {
        let done = {
            let mut status = self.status.lock().expect("lock is poisoned");

            if *status == Status::Closed {
                return Err(Error::Closed);
            }
            *status = Status::Closed;

            // dropping the sender ends the worker loop once the queue drained
            self.tx.write().expect("lock is poisoned").take();
            self.done.lock().expect("lock is poisoned").take()
        };

        match done {
            Some(done) => done.recv().map_err(|_| Error::Closed)?,
            None => Ok(()),
        }
    }

    fn dispatch(&self, task: Task) -> crate::Result<()> {
        let tx = {
            let tx = self.tx.read().expect("lock is poisoned");

            match &*tx {
                Some(tx) => tx.clone(),
                None => {
                    let status = *self.status.lock().expect("lock is poisoned");

                    return Err(if status == Status::Closed {
                        Error::Closed
                    } else {
                        Error::InvalidState {
                            expected: Status::Running,
                            actual: status,
                        }
                    });
                }
            }
        };

        tx.send(task).map_err(|_| Error::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{operation::OpKind, record::Record};

    fn set_op(key: &str) -> crate::Result<Operation> {
        let value = serde_json::value::to_raw_value(key)?;
        let record = Record::new("t".into(), key.as_bytes().into(), Some(value));
        Ok(Operation::new(OpKind::Set, record))
    }

    #[test]
    fn lifecycle_order_is_enforced() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = Writer::new(dir.path(), 100);

        // start before load
        assert!(matches!(
            writer.start(),
            Err(Error::InvalidState {
                expected: Status::Loaded,
                ..
            })
        ));

        // write before start
        assert!(matches!(
            writer.write(set_op("a")?),
            Err(Error::InvalidState {
                expected: Status::Running,
                ..
            })
        ));

        writer.load(&mut |op| Ok(op.lsn))?;

        // double load
        assert!(matches!(
            writer.load(&mut |op| Ok(op.lsn)),
            Err(Error::InvalidState {
                expected: Status::Created,
                ..
            })
        ));

        writer.start()?;
        writer.write(set_op("a")?)?;

        writer.close()?;
        assert!(matches!(writer.close(), Err(Error::Closed)));
        assert!(matches!(writer.write(set_op("b")?), Err(Error::Closed)));

        Ok(())
    }

    #[test]
    fn write_returns_durable_lsn() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = Writer::new(dir.path(), 100);

        writer.load(&mut |op| Ok(op.lsn))?;
        writer.start()?;

        let op = writer.write(set_op("a")?)?;
        assert_eq!(op.lsn, 1);
        assert!(op.time > 0);
        assert_eq!(op.record.lsn(), 1);
        assert_eq!(writer.lsn(), 1);

        let op = writer.write(set_op("b")?)?;
        assert_eq!(op.lsn, 2);

        writer.close()?;

        // the worker has synced and closed the segment; its lines are intact
        let content = std::fs::read_to_string(dir.path().join("0000000001.jlog"))?;
        assert_eq!(content.lines().count(), 2);

        Ok(())
    }

    #[test]
    fn explicit_rotation_switches_segments() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let writer = Writer::new(dir.path(), 100);

        writer.load(&mut |op| Ok(op.lsn))?;
        writer.start()?;

        writer.write(set_op("a")?)?;
        writer.rotate()?;
        writer.write(set_op("b")?)?;
        writer.close()?;

        assert!(dir.path().join("0000000001.jlog").try_exists()?);
        assert!(dir.path().join("0000000002.jlog").try_exists()?);

        Ok(())
    }
}
