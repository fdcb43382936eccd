//! Git object identifiers and raw objects

use std::{fmt, str::FromStr};

use gix_object::Kind;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Length of a SHA-1 object id in bytes
pub const OBJECT_ID_LEN: usize = 20;

/// Identifier text that is not 40 hex characters
#[derive(Debug, Error)]
#[error("malformed object id {input:?}")]
pub struct IdError {
    pub input: String,
    #[source]
    source: hex::FromHexError,
}

/// Git SHA-1 object id.
///
/// Stored as the binary digest; the lowercase hex form is only produced for
/// display and logging.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OBJECT_ID_LEN]);

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; OBJECT_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Build an id from a digest slice; `None` unless it is exactly 20 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; OBJECT_ID_LEN]>::try_from(bytes).ok().map(Self)
    }

    /// Decode 40 hex characters (either case).
    pub fn from_hex(hex: impl AsRef<[u8]>) -> Result<Self, IdError> {
        let hex = hex.as_ref();
        let mut digest = [0u8; OBJECT_ID_LEN];
        hex::decode_to_slice(hex, &mut digest).map_err(|source| IdError {
            input: String::from_utf8_lossy(hex).into_owned(),
            source,
        })?;
        Ok(Self(digest))
    }

    pub fn as_bytes(&self) -> &[u8; OBJECT_ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// An object as the local store hands it back: kind, declared size and the
/// payload without header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: Kind,
    pub size: u64,
    pub data: Vec<u8>,
}

impl RawObject {
    /// Raw object whose declared size is the payload length
    pub fn new(kind: Kind, data: Vec<u8>) -> Self {
        Self {
            kind,
            size: data.len() as u64,
            data,
        }
    }
}
