use crate::Database;
use std::path::{Path, PathBuf};

/// Capacity of the writer's request queue
const DEFAULT_QUEUE_SIZE: usize = 100;

/// Alive ratio below which opening a database triggers a snapshot
const DEFAULT_COMPACTION_THRESHOLD: f64 = 0.5;

/// Database configuration
///
/// ```
/// use tarn::Config;
///
/// # let folder = tempfile::tempdir()?;
/// let db = Config::new(&folder).open()?;
/// #
/// # Ok::<_, tarn::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory the database lives in; created if missing
    pub(crate) path: PathBuf,

    pub(crate) queue_size: usize,

    pub(crate) compaction_threshold: f64,
}

impl Config {
    /// Creates a config for a database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            queue_size: DEFAULT_QUEUE_SIZE,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }

    /// Sets the capacity of the writer's request queue.
    ///
    /// Callers of mutating operations block while the queue is full.
    ///
    /// Default: 100
    #[must_use]
    pub fn queue_size(mut self, size: usize) -> Self {
        self.queue_size = size;
        self
    }

    /// Sets the alive ratio below which `open` collapses the log into a
    /// snapshot before returning.
    ///
    /// Setting it to 0.0 disables compaction at open.
    ///
    /// Default: 0.5
    #[must_use]
    pub fn compaction_threshold(mut self, threshold: f64) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    /// Opens the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, replay hits a
    /// malformed or unsupported log entry, or the initial rotation fails.
    pub fn open(self) -> crate::Result<Database> {
        Database::open_with(self)
    }
}
