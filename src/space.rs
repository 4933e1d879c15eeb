use crate::{
    operation::{OpKind, Operation},
    record::{Document, Key, Record, SpaceName},
    writer::Writer,
    Error,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    ops::Bound,
    sync::{
        atomic::{
            AtomicU64,
            Ordering::{AcqRel, Acquire, Relaxed},
        },
        Arc, RwLock,
    },
};

/// The ordered index: at most one record per key, byte-lexicographic order
type Tree = BTreeMap<Key, Arc<Record>>;

#[allow(clippy::module_name_repetitions)]
#[doc(hidden)]
pub struct SpaceInner {
    /// Space name; every stored record is tagged with it
    pub(crate) name: SpaceName,

    tree: RwLock<Tree>,

    /// Superseded or deleted records since the last compaction baseline
    dead: AtomicU64,

    /// `None` for view copies, which are read-only
    writer: Option<Writer>,
}

/// Handle to a space (a named key namespace, analogous to a table)
///
/// Mutations are written to the operation log before the in-memory index is
/// updated, so a returned `Ok` means the change is durable in the journal.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tarn::{Config, Document};
///
/// #[derive(Debug, Deserialize, Serialize, PartialEq)]
/// struct User {
///     name: String,
/// }
///
/// impl Document for User {}
///
/// # let folder = tempfile::tempdir()?;
/// let db = Config::new(&folder).open()?;
/// let users = db.new_space("users")?;
///
/// users.set("Alice", &User { name: "Alice".into() })?;
///
/// let alice: User = users.get("Alice")?;
/// assert_eq!(alice.name, "Alice");
/// #
/// # Ok::<_, tarn::Error>(())
/// ```
#[derive(Clone)]
pub struct Space(pub(crate) Arc<SpaceInner>);

impl std::ops::Deref for Space {
    type Target = SpaceInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Space {
    pub(crate) fn create(name: SpaceName, writer: Writer) -> Self {
        Self(Arc::new(SpaceInner {
            name,
            tree: RwLock::default(),
            dead: AtomicU64::new(0),
            writer: Some(writer),
        }))
    }

    /// Returns a structurally independent copy of this space's index.
    ///
    /// The copy shares no mutable state with the parent and carries no
    /// writer; the snapshotter iterates it while new writes keep landing in
    /// the parent. Its dead counter freezes the parent's value at capture
    /// time.
    pub(crate) fn view(&self) -> Self {
        let tree = self.tree.read().expect("lock is poisoned").clone();

        Self(Arc::new(SpaceInner {
            name: self.name.clone(),
            tree: RwLock::new(tree),
            dead: AtomicU64::new(self.dead()),
            writer: None,
        }))
    }

    /// Name of this space
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live records
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.read().expect("lock is poisoned").len()
    }

    /// Returns `true` if the space holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.read().expect("lock is poisoned").is_empty()
    }

    /// Inserts or replaces a record, making it durable first.
    ///
    /// The value is serialized to JSON once and stored in encoded form.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty key, a serialization failure or a
    /// journal write failure.
    pub fn set<K: AsRef<[u8]>, V: Serialize + ?Sized>(
        &self,
        key: K,
        value: &V,
    ) -> crate::Result<()> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let writer = self.writer.as_ref().ok_or(Error::Closed)?;

        let value = serde_json::value::to_raw_value(value)?;
        let record = Record::new(self.name.clone(), key.into(), Some(value));

        let op = writer.write(Operation::new(OpKind::Set, record))?;
        self.install(Arc::new(op.record));

        Ok(())
    }

    /// Removes the record at `key`, making the deletion durable first.
    ///
    /// Removing an absent key still writes a `del` operation and is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty key or a journal write failure.
    pub fn del<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<()> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let writer = self.writer.as_ref().ok_or(Error::Closed)?;

        let record = Record::new(self.name.clone(), key.into(), None);
        let op = writer.write(Operation::new(OpKind::Del, record))?;

        self.remove(&op.record.key);

        Ok(())
    }

    /// Looks up `key` and decodes the stored value.
    ///
    /// The decoded document is an independent copy; mutating it does not
    /// affect the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyKey`] for an empty key, [`Error::NotFound`] on
    /// a miss, or a JSON error if the stored value does not fit `D`.
    pub fn get<K: AsRef<[u8]>, D: Document>(&self, key: K) -> crate::Result<D> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let record = self
            .tree
            .read()
            .expect("lock is poisoned")
            .get(key)
            .cloned()
            .ok_or(Error::NotFound)?;

        record.decode()
    }

    /// Iterates records with keys `>= key` in ascending key order.
    ///
    /// Iteration stops when `f` returns `false`. The callback runs under the
    /// index read lock and must not mutate this space.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if a stored value does not fit `D`.
    pub fn ge<K: AsRef<[u8]>, D: Document>(
        &self,
        key: K,
        mut f: impl FnMut(D) -> bool,
    ) -> crate::Result<()> {
        let tree = self.tree.read().expect("lock is poisoned");

        for (_, record) in tree.range::<[u8], _>((Bound::Included(key.as_ref()), Bound::Unbounded))
        {
            if !f(record.decode()?) {
                break;
            }
        }

        Ok(())
    }

    /// Iterates records with keys `<= key` in descending key order.
    ///
    /// Iteration stops when `f` returns `false`. The callback runs under the
    /// index read lock and must not mutate this space.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if a stored value does not fit `D`.
    pub fn le<K: AsRef<[u8]>, D: Document>(
        &self,
        key: K,
        mut f: impl FnMut(D) -> bool,
    ) -> crate::Result<()> {
        let tree = self.tree.read().expect("lock is poisoned");

        for (_, record) in tree
            .range::<[u8], _>((Bound::Unbounded, Bound::Included(key.as_ref())))
            .rev()
        {
            if !f(record.decode()?) {
                break;
            }
        }

        Ok(())
    }

    /// Decodes the record with the smallest key, if any.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the stored value does not fit `D`.
    pub fn min<D: Document>(&self) -> crate::Result<Option<D>> {
        let record = self
            .tree
            .read()
            .expect("lock is poisoned")
            .values()
            .next()
            .cloned();

        record.map(|r| r.decode()).transpose()
    }

    /// Decodes the record with the largest key, if any.
    ///
    /// # Errors
    ///
    /// Returns a JSON error if the stored value does not fit `D`.
    pub fn max<D: Document>(&self) -> crate::Result<Option<D>> {
        let record = self
            .tree
            .read()
            .expect("lock is poisoned")
            .values()
            .next_back()
            .cloned();

        record.map(|r| r.decode()).transpose()
    }

    /// Returns a one-shot forward iterator over all records.
    ///
    /// The iterator owns a snapshot of the index taken at call time, so it
    /// keeps yielding a consistent view while the space is mutated.
    #[allow(clippy::iter_not_returning_iterator)]
    #[must_use]
    pub fn iter(&self) -> Iter {
        let tree = self.tree.read().expect("lock is poisoned").clone();

        Iter {
            inner: tree.into_iter(),
        }
    }

    /// Materializes a replayed or freshly written record, bypassing the
    /// write path.
    pub(crate) fn install(&self, record: Arc<Record>) {
        let prev = self
            .tree
            .write()
            .expect("lock is poisoned")
            .insert(record.key.clone(), record);

        if prev.is_some() {
            self.dead.fetch_add(1, Relaxed);
        }
    }

    /// Drops the record at `key` from the index, bypassing the write path.
    pub(crate) fn remove(&self, key: &[u8]) {
        let prev = self.tree.write().expect("lock is poisoned").remove(key);

        if prev.is_some() {
            self.dead.fetch_add(1, Relaxed);
        }
    }

    /// Number of live records (same as `len`, counted for stats)
    pub(crate) fn alive(&self) -> u64 {
        self.len() as u64
    }

    /// Superseded or deleted records since the last compaction baseline
    pub(crate) fn dead(&self) -> u64 {
        self.dead.load(Acquire)
    }

    /// A writer-less space for exercising the index on its own.
    #[cfg(test)]
    pub(crate) fn detached(name: &str) -> Self {
        Self(Arc::new(SpaceInner {
            name: name.into(),
            tree: RwLock::default(),
            dead: AtomicU64::new(0),
            writer: None,
        }))
    }

    /// Subtracts `sub` compacted-away records, saturating at zero.
    pub(crate) fn dec_dead(&self, sub: u64) {
        // NOTE: always returns Ok because the closure never yields None
        let _ = self
            .dead
            .fetch_update(AcqRel, Acquire, |dead| Some(dead.saturating_sub(sub)));
    }
}

/// One-shot forward iterator over a space, yielding record handles
///
/// Obtained via [`Space::iter`]; its snapshot of the index is released on
/// drop.
pub struct Iter {
    inner: std::collections::btree_map::IntoIter<Key, Arc<Record>>,
}

impl Iterator for Iter {
    type Item = Arc<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, record)| record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter {}
