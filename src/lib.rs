#![deny(clippy::mod_module_files)]
//! Push a git object graph into an IPLD DAG store.
//!
//! The traversal starts at one object id, transcodes every reachable object
//! into git's canonical `"<kind> <size>\0<payload>"` form, hands it to the
//! DAG store and checks the CID the store reports against the one derived
//! from the git id. A durable ledger keeps objects from being uploaded twice.

pub mod config;
pub mod error;
pub mod git;
pub mod ipld;
pub mod push;
pub mod storage;

pub use error::PushError;
pub use git::{CanonicalForm, ObjectId, RawObject};
pub use ipld::ContentAddress;
pub use push::{CancelToken, Completion, Observer, Push, PushSummary};
