use std::sync::{
    atomic::{
        AtomicU64,
        Ordering::{AcqRel, Acquire},
    },
    Arc,
};

/// Log sequence number
///
/// Every durable operation carries an LSN; they are strictly increasing
/// across the lifetime of a database directory. An LSN of 0 marks a record
/// that has not been persisted yet.
pub type Lsn = u64;

/// Thread-safe LSN source shared between the writer, its worker thread and
/// replay.
///
/// The counter only ever moves upward: [`LsnCounter::fetch_max`] is used
/// instead of a plain store so that concurrent readers (recovery, snapshot
/// floor computation) can never observe a regression.
#[derive(Clone, Debug, Default)]
pub struct LsnCounter(Arc<AtomicU64>);

impl LsnCounter {
    /// Gets the current LSN.
    #[must_use]
    pub fn get(&self) -> Lsn {
        self.0.load(Acquire)
    }

    /// Advances the counter to `lsn` unless it is already higher.
    pub(crate) fn fetch_max(&self, lsn: Lsn) {
        self.0.fetch_max(lsn, AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsn_counter_monotonic() {
        let counter = LsnCounter::default();
        assert_eq!(counter.get(), 0);

        counter.fetch_max(5);
        assert_eq!(counter.get(), 5);

        // lower values must not regress the counter
        counter.fetch_max(3);
        assert_eq!(counter.get(), 5);

        counter.fetch_max(6);
        assert_eq!(counter.get(), 6);
    }
}
