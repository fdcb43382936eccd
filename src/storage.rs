mod ledger;
mod memory;
mod traits;

pub use ledger::{FileLedger, MemoryLedger};
pub use memory::{MemoryDagStore, MemoryObjectSource};
pub use traits::{DagPutOptions, DagStore, Ledger, ObjectSource};
