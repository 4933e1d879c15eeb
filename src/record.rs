use crate::lsn::Lsn;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::value::RawValue;
use std::sync::Arc;

/// User-supplied key, an opaque byte string
///
/// Keys are ordered byte-lexicographically inside a space. The on-disk format
/// stores them as JSON strings, so binary keys should be UTF-8-safe or the
/// caller accepts lossy escaping.
pub type Key = Arc<[u8]>;

/// Name of a space (key namespace)
pub type SpaceName = Arc<str>;

/// Record metadata handed to [`Document::set_header`] on read
#[derive(Clone, Debug, Default)]
pub struct Header {
    /// LSN the record was persisted under
    pub lsn: Lsn,

    /// Unix timestamp (seconds) of the durable write
    pub time: i64,

    /// The record's key
    pub key: Key,
}

/// Implemented by types that can be read out of a space.
///
/// Any `DeserializeOwned` type qualifies with a one-line impl; override
/// [`Document::set_header`] to additionally receive the record's LSN,
/// timestamp and key:
///
/// ```
/// use serde::Deserialize;
/// use tarn::{Document, Header};
///
/// #[derive(Default, Deserialize)]
/// struct User {
///     name: String,
///
///     #[serde(skip)]
///     header: Header,
/// }
///
/// impl Document for User {
///     fn set_header(&mut self, header: Header) {
///         self.header = header;
///     }
/// }
/// ```
pub trait Document: DeserializeOwned {
    /// Called after decoding with the record's metadata.
    fn set_header(&mut self, header: Header) {
        let _ = header;
    }
}

/// A single stored key-value entry
///
/// The value is kept in its encoded JSON form and only decoded on read.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Record {
    #[serde(skip)]
    pub(crate) lsn: Lsn,

    #[serde(skip)]
    pub(crate) time: i64,

    pub(crate) tag: SpaceName,

    #[serde(with = "key_string")]
    pub(crate) key: Key,

    #[serde(default)]
    pub(crate) value: Option<Box<RawValue>>,
}

impl Record {
    pub(crate) fn new(tag: SpaceName, key: Key, value: Option<Box<RawValue>>) -> Self {
        Self {
            lsn: 0,
            time: 0,
            tag,
            key,
            value,
        }
    }

    /// LSN the record was persisted under (0 when not yet durable)
    #[must_use]
    pub fn lsn(&self) -> Lsn {
        self.lsn
    }

    /// Unix timestamp (seconds) of the durable write
    #[must_use]
    pub fn time(&self) -> i64 {
        self.time
    }

    /// Name of the owning space
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The record's key
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The record's metadata
    #[must_use]
    pub fn header(&self) -> Header {
        Header {
            lsn: self.lsn,
            time: self.time,
            key: self.key.clone(),
        }
    }

    /// Decodes the stored value into a fresh `D`, then hands it the header.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] for a record without a value
    /// (a deletion), or a JSON error if the stored value does not fit `D`.
    pub fn decode<D: Document>(&self) -> crate::Result<D> {
        let value = self.value.as_ref().ok_or(crate::Error::NotFound)?;

        let mut doc: D = serde_json::from_str(value.get())?;
        doc.set_header(self.header());

        Ok(doc)
    }
}

mod key_string {
    use super::Key;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &Key, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Key, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.into_bytes().into())
    }
}
