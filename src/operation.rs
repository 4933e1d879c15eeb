use crate::{lsn::Lsn, record::Record};
use serde::{Deserialize, Serialize};

/// Action kind of a log entry
///
/// Only `set` and `del` are ever emitted. `begin`, `commit` and `rollback`
/// are reserved in the format: they parse, but replay rejects them.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Insert or replace a record
    Set,

    /// Remove a record
    Del,

    /// Reserved for multi-space transactions
    Begin,

    /// Reserved for multi-space transactions
    Commit,

    /// Reserved for multi-space transactions
    Rollback,
}

/// One line of a journal segment or snapshot file
///
/// Serialized as newline-delimited JSON:
///
/// ```text
/// {"lsn":1,"op":"set","time":1750280676,"record":{"tag":"users","key":"Alice","value":{...}}}
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Operation {
    /// LSN assigned by the writer (0 while in flight)
    pub lsn: Lsn,

    /// Action kind
    pub op: OpKind,

    /// Unix timestamp (seconds) assigned by the writer
    pub time: i64,

    /// The affected record
    pub record: Record,
}

impl Operation {
    /// A fresh operation awaiting LSN and timestamp assignment.
    pub(crate) fn new(op: OpKind, record: Record) -> Self {
        Self {
            lsn: 0,
            op,
            time: 0,
            record,
        }
    }

    /// A `set` line for a snapshot dump; LSN and timestamp are taken from
    /// the record, not reassigned.
    pub(crate) fn from_record(record: &Record) -> Self {
        Self {
            lsn: record.lsn,
            op: OpKind::Set,
            time: record.time,
            record: record.clone(),
        }
    }
}

/// Gets the unix timestamp in seconds
pub(crate) fn unix_timestamp() -> i64 {
    let now = std::time::SystemTime::now();

    // NOTE: Unwrap is trivial
    #[allow(clippy::expect_used)]
    let since_epoch = now
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .expect("time went backwards");

    since_epoch.as_secs() as i64
}
