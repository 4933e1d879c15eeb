//! An embedded key-value store with an append-only JSON operation log and
//! snapshot compaction.
//!
//! It is not:
//!
//! - a standalone server
//! - a relational database
//! - a replicated or multi-process store
//!
//! This crate exports a [`Database`], which is a directory of named
//! [`Space`]s (key namespaces, analogous to tables). Every mutation is
//! appended to a single database-level journal before it becomes visible in
//! the in-memory index, so a returned `Ok` means the change is durable.
//! Journal segments are periodically collapsed into snapshot files holding
//! one line per live record; recovery replays the latest snapshot plus the
//! journal segments after it.
//!
//! Keys are opaque byte strings ordered byte-lexicographically; values are
//! anything `serde`-serializable, stored as JSON.
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tarn::{Config, Document};
//!
//! #[derive(Debug, Deserialize, Serialize, PartialEq)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Document for User {}
//!
//! # let folder = tempfile::tempdir()?;
//! #
//! let db = Config::new(&folder).open()?;
//!
//! // Each space is its own ordered index
//! let users = db.new_space("users")?;
//!
//! // Write some data
//! users.set("Alice", &User { name: "Alice".into(), age: 30 })?;
//!
//! // And retrieve it
//! let alice: User = users.get("Alice")?;
//! assert_eq!(alice.age, 30);
//!
//! // Scan in key order
//! users.ge("A", |user: User| {
//!     println!("{user:?}");
//!     true
//! })?;
//!
//! // Collapse the journal into a snapshot
//! db.snapshot()?;
//!
//! // Or remove it again
//! users.del("Alice")?;
//!
//! // Close flushes the journal; dropping the last handle does too
//! db.close()?;
//! #
//! # Ok::<_, tarn::Error>(())
//! ```
#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]

mod config;
mod db;
mod error;
mod file;
mod lsn;
mod operation;
mod record;
mod space;
mod stats;
mod writer;

pub use {
    config::Config,
    db::{Database, Txn},
    error::{Error, Result},
    lsn::Lsn,
    operation::{OpKind, Operation},
    record::{Document, Header, Key, Record, SpaceName},
    space::{Iter, Space},
    stats::Stats,
    writer::Status,
};
