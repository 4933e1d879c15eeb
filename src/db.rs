use crate::{
    config::Config,
    operation::{OpKind, Operation},
    record::SpaceName,
    space::Space,
    stats::Stats,
    writer::{task::Views, Writer},
    Error, Lsn,
};
use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{
            AtomicBool,
            Ordering::{Acquire, SeqCst},
        },
        Arc, RwLock,
    },
};

/// Space registry of a database
pub(crate) type Spaces = HashMap<SpaceName, Space>;

#[allow(clippy::module_name_repetitions)]
#[doc(hidden)]
pub struct DatabaseInner {
    pub(crate) config: Config,

    pub(crate) spaces: RwLock<Spaces>,

    pub(crate) writer: Writer,

    pub(crate) closed: AtomicBool,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        log::trace!("Dropping database");

        if !self.closed.load(SeqCst) {
            if let Err(e) = self.writer.close() {
                log::error!("Failed to flush journal on drop: {e:?}");
            }
        }
    }
}

/// Handle to a database: a directory of named spaces backed by one
/// append-only operation log
///
/// Opening replays the directory (latest snapshot plus newer journal
/// segments) into memory, then starts the writer. All handles point at the
/// same instance; the journal is flushed when the last one is dropped or
/// [`Database::close`] is called.
#[derive(Clone)]
pub struct Database(pub(crate) Arc<DatabaseInner>);

impl std::ops::Deref for Database {
    type Target = DatabaseInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Database {
    /// Opens (or creates) a database at the given path with defaults.
    ///
    /// Shorthand for [`Config::open`].
    ///
    /// # Errors
    ///
    /// Returns an error if recovery or the initial rotation fails.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Config::new(path).open()
    }

    pub(crate) fn open_with(config: Config) -> crate::Result<Self> {
        log::debug!("Opening database at {}", config.path.display());

        let writer = Writer::new(config.path.clone(), config.queue_size);

        let db = Self(Arc::new(DatabaseInner {
            writer,
            spaces: RwLock::default(),
            closed: AtomicBool::new(false),
            config,
        }));

        if let Err(e) = db.recover() {
            let _ = db.writer.close();
            db.closed.store(true, SeqCst);
            return Err(e);
        }

        Ok(db)
    }

    fn recover(&self) -> crate::Result<()> {
        self.writer.load(&mut |op| self.apply(op))?;
        self.writer.start()?;

        let stats = self.stats();
        log::debug!(
            "Database stats: {} alive, {} dead ({:.2}% alive)",
            stats.alive,
            stats.dead,
            stats.alive_pct() * 100.0,
        );

        if stats.alive_pct() < self.config.compaction_threshold {
            self.snapshot()?;
        }

        Ok(())
    }

    /// Directory this database lives in
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the space with the given name, or `None` if it does not
    /// exist (or the database is closed).
    #[must_use]
    pub fn space(&self, name: &str) -> Option<Space> {
        if self.closed.load(Acquire) {
            return None;
        }

        self.spaces
            .read()
            .expect("lock is poisoned")
            .get(name)
            .cloned()
    }

    /// Returns the space with the given name, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after close.
    pub fn new_space(&self, name: &str) -> crate::Result<Space> {
        if self.closed.load(Acquire) {
            return Err(Error::Closed);
        }

        Ok(self.space_or_create(name))
    }

    /// Runs `txn` under the database write lock.
    ///
    /// The closure receives a [`Txn`] for looking up existing spaces; no
    /// snapshot or space creation can interleave while it runs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after close, otherwise whatever `txn`
    /// returns.
    pub fn update<T>(&self, txn: impl FnOnce(&Txn<'_>) -> crate::Result<T>) -> crate::Result<T> {
        let spaces = self.spaces.write().expect("lock is poisoned");

        if self.closed.load(Acquire) {
            return Err(Error::Closed);
        }

        txn(&Txn { spaces: &spaces })
    }

    /// Runs `txn` under the database read lock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after close, otherwise whatever `txn`
    /// returns.
    pub fn view<T>(&self, txn: impl FnOnce(&Txn<'_>) -> crate::Result<T>) -> crate::Result<T> {
        let spaces = self.spaces.read().expect("lock is poisoned");

        if self.closed.load(Acquire) {
            return Err(Error::Closed);
        }

        txn(&Txn { spaces: &spaces })
    }

    /// Aggregate live/dead counts across all spaces
    #[must_use]
    pub fn stats(&self) -> Stats {
        let spaces = self.spaces.read().expect("lock is poisoned");

        let mut stats = Stats::default();
        for space in spaces.values() {
            stats.alive += space.alive();
            stats.dead += space.dead();
        }

        stats
    }

    /// Collapses the journal into a snapshot file holding exactly the live
    /// records, then deletes the files it supersedes.
    ///
    /// The per-space index copies are taken under the write lock, but the
    /// dump itself runs in the background against those copies; concurrent
    /// writes keep flowing into a freshly rotated segment. Blocks until the
    /// dump finished.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] after close, or the dump's I/O error. A
    /// failed snapshot leaves the database fully usable.
    pub fn snapshot(&self) -> crate::Result<()> {
        let views: Vec<(SpaceName, Space)> = {
            let spaces = self.spaces.write().expect("lock is poisoned");

            if self.closed.load(Acquire) {
                return Err(Error::Closed);
            }

            // nothing durable yet, nothing to collapse
            if self.writer.lsn() == 0 {
                return Ok(());
            }

            spaces
                .iter()
                .map(|(name, space)| (name.clone(), space.view()))
                .collect()
        };

        let stats_before = self.stats();

        let dead_counts: Vec<(SpaceName, u64)> = views
            .iter()
            .map(|(name, view)| (name.clone(), view.dead()))
            .collect();

        self.writer
            .snapshot(views.into_iter().collect::<Views>())?;

        // the dump succeeded: the dead records it observed are gone from disk
        {
            let spaces = self.spaces.read().expect("lock is poisoned");

            for (name, dead) in dead_counts {
                if let Some(space) = spaces.get(&*name) {
                    space.dec_dead(dead);
                }
            }
        }

        let stats = self.stats();
        log::info!(
            "Compaction: {} -> {} record(s) ({:.2}% alive)",
            stats_before.alive + stats_before.dead,
            stats.alive + stats.dead,
            stats.alive_pct() * 100.0,
        );

        Ok(())
    }

    /// Closes the database, draining the writer queue and flushing the
    /// current segment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] on a second close. A flush error is
    /// reported, but the database is marked closed regardless.
    pub fn close(&self) -> crate::Result<()> {
        let mut spaces = self.spaces.write().expect("lock is poisoned");

        if self.closed.swap(true, SeqCst) {
            return Err(Error::Closed);
        }

        let result = self.writer.close();
        spaces.clear();

        result
    }

    /// Applies one replayed operation directly to the in-memory index,
    /// bypassing the write path.
    fn apply(&self, op: Operation) -> crate::Result<Lsn> {
        let Operation {
            lsn,
            op: kind,
            time,
            mut record,
        } = op;

        record.lsn = lsn;
        record.time = time;

        match kind {
            OpKind::Set => {
                let space = self.space_or_create(&record.tag);
                space.install(Arc::new(record));
            }

            OpKind::Del => {
                if let Some(space) = self.space(&record.tag) {
                    space.remove(&record.key);
                }
            }

            kind => return Err(Error::UnsupportedOperation(kind)),
        }

        Ok(lsn)
    }

    fn space_or_create(&self, name: &str) -> Space {
        if let Some(space) = self
            .spaces
            .read()
            .expect("lock is poisoned")
            .get(name)
            .cloned()
        {
            return space;
        }

        let mut spaces = self.spaces.write().expect("lock is poisoned");

        // racing creators: somebody else may have won the write lock first
        if let Some(space) = spaces.get(name).cloned() {
            return space;
        }

        let name: SpaceName = name.into();
        let space = Space::create(name.clone(), self.writer.clone());
        spaces.insert(name, space.clone());

        space
    }
}

/// Space lookup handed to [`Database::update`] and [`Database::view`]
/// closures
///
/// Lookups see the registry as of lock acquisition; spaces are not created
/// through it.
pub struct Txn<'a> {
    spaces: &'a Spaces,
}

impl Txn<'_> {
    /// Returns the space with the given name, if it exists.
    #[must_use]
    pub fn space(&self, name: &str) -> Option<Space> {
        self.spaces.get(name).cloned()
    }
}
