use std::sync::Arc;

use anyhow::Result;

use crate::{
    git::{CanonicalForm, ObjectId, RawObject},
    ipld::ContentAddress,
};

/// Local git object store
pub trait ObjectSource {
    /// Read kind, declared size and payload for `id`.
    /// Returns error if the object is missing or unreadable.
    fn read(&self, id: &ObjectId) -> Result<RawObject>;
}

/// Durable record of objects already transferred.
/// Entries are never removed.
pub trait Ledger {
    /// Check whether `id` was transferred by this or an earlier run.
    fn has(&self, id: &ObjectId) -> Result<bool>;

    /// Mark `id` as transferred.
    /// Must be durable once this returns; recording twice is harmless.
    fn record(&self, id: &ObjectId) -> Result<()>;
}

/// Input format and codec pair handed to the DAG store with each object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagPutOptions {
    pub format: &'static str,
    pub codec: &'static str,
}

impl DagPutOptions {
    /// Canonical git bytes, stored under the git codec
    pub const GIT_RAW: DagPutOptions = DagPutOptions {
        format: "raw",
        codec: "git",
    };
}

/// Remote content-addressed DAG store
pub trait DagStore {
    /// Store canonical bytes and return the address the store computed.
    fn put(&self, form: &CanonicalForm, options: &DagPutOptions) -> Result<ContentAddress>;
}

impl<T: ObjectSource + ?Sized> ObjectSource for Box<T> {
    fn read(&self, id: &ObjectId) -> Result<RawObject> {
        (**self).read(id)
    }
}

impl<T: Ledger + ?Sized> Ledger for Box<T> {
    fn has(&self, id: &ObjectId) -> Result<bool> {
        (**self).has(id)
    }

    fn record(&self, id: &ObjectId) -> Result<()> {
        (**self).record(id)
    }
}

impl<T: Ledger + ?Sized> Ledger for Arc<T> {
    fn has(&self, id: &ObjectId) -> Result<bool> {
        (**self).has(id)
    }

    fn record(&self, id: &ObjectId) -> Result<()> {
        (**self).record(id)
    }
}

impl<T: DagStore + ?Sized> DagStore for Box<T> {
    fn put(&self, form: &CanonicalForm, options: &DagPutOptions) -> Result<ContentAddress> {
        (**self).put(form, options)
    }
}

impl<T: DagStore + ?Sized> DagStore for Arc<T> {
    fn put(&self, form: &CanonicalForm, options: &DagPutOptions) -> Result<ContentAddress> {
        (**self).put(form, options)
    }
}
