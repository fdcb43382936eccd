use std::{collections::HashMap, sync::Mutex};

use anyhow::{Context, Result};
use gix_object::Kind;

use super::traits::{DagPutOptions, DagStore, ObjectSource};
use crate::{
    git::{CanonicalForm, ObjectId, RawObject},
    ipld::ContentAddress,
};

/// Object source backed by a map, keyed by the real git id of each object
#[derive(Debug, Default)]
pub struct MemoryObjectSource {
    objects: HashMap<ObjectId, RawObject>,
}

impl MemoryObjectSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object and return its git id (SHA-1 of the canonical form)
    pub fn insert(&mut self, kind: Kind, data: impl AsRef<[u8]>) -> ObjectId {
        let form = CanonicalForm::new(kind, data.as_ref());
        let id = form.object_id();
        self.objects.insert(id, form.to_raw());
        id
    }

    /// Store `raw` under an arbitrary id, bypassing hashing
    pub fn insert_as(&mut self, id: ObjectId, raw: RawObject) {
        self.objects.insert(id, raw);
    }
}

impl ObjectSource for MemoryObjectSource {
    fn read(&self, id: &ObjectId) -> Result<RawObject> {
        self.objects
            .get(id)
            .cloned()
            .with_context(|| format!("Object {} not found", id))
    }
}

/// DAG store that computes addresses locally and keeps every put.
///
/// Behaves like a correct remote store: the address it reports is the
/// SHA-1 `git-raw` CID of the submitted bytes.
#[derive(Debug, Default)]
pub struct MemoryDagStore {
    puts: Mutex<Vec<(ContentAddress, CanonicalForm)>>,
}

impl MemoryDagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls so far
    pub fn put_count(&self) -> usize {
        self.puts.lock().map(|puts| puts.len()).unwrap_or(0)
    }

    /// Addresses in the order they were put
    pub fn addresses(&self) -> Vec<ContentAddress> {
        self.puts
            .lock()
            .map(|puts| puts.iter().map(|(address, _)| *address).collect())
            .unwrap_or_default()
    }

    /// Canonical bytes stored under `address`
    pub fn get(&self, address: &ContentAddress) -> Option<CanonicalForm> {
        self.puts.lock().ok().and_then(|puts| {
            puts.iter()
                .find(|(stored, _)| stored == address)
                .map(|(_, form)| form.clone())
        })
    }
}

impl DagStore for MemoryDagStore {
    fn put(&self, form: &CanonicalForm, options: &DagPutOptions) -> Result<ContentAddress> {
        if *options != DagPutOptions::GIT_RAW {
            anyhow::bail!(
                "Unsupported input format {:?} / codec {:?}",
                options.format,
                options.codec
            );
        }

        let address = ContentAddress::of_canonical(form);
        self.puts
            .lock()
            .map_err(|_| anyhow::anyhow!("DAG store lock poisoned"))?
            .push((address, form.clone()));

        tracing::debug!("Stored {} bytes at {}", form.len(), address);
        Ok(address)
    }
}
