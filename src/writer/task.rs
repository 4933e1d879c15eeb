use crate::{operation::Operation, record::SpaceName, space::Space};
use std::collections::HashMap;

/// Space views captured for a snapshot, keyed by space name
pub type Views = HashMap<SpaceName, Space>;

/// Single-shot reply channel; the worker answers every request exactly once
pub type Ack<T> = flume::Sender<crate::Result<T>>;

/// A request queued to the writer's worker thread
pub enum Task {
    /// Append one operation to the current segment; replies with the
    /// operation carrying its assigned LSN and timestamp
    Write {
        /// The operation to persist
        op: Operation,
        /// Reply channel
        ack: Ack<Operation>,
    },

    /// Rotate to a fresh journal segment
    Rotate {
        /// Reply channel
        ack: Ack<()>,
    },

    /// Rotate, then dump the given views into a snapshot file in the
    /// background; the reply is deferred until the dump finished
    Snapshot {
        /// Frozen per-space index copies
        views: Views,
        /// Reply channel, answered by the background job
        ack: Ack<()>,
    },
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Write { .. } => "Task:Write",
                Self::Rotate { .. } => "Task:Rotate",
                Self::Snapshot { .. } => "Task:Snapshot",
            }
        )
    }
}
