//! Git objects: identifiers, canonical encoding, link discovery and the
//! local object stores they are read from.

mod canonical;
mod links;
mod objects;
mod source;

pub use canonical::{encode, kind_word, parse_kind, CanonicalForm, EncodeError};
pub use links::{extract_links, LinkParseError};
pub use objects::{IdError, ObjectId, RawObject, OBJECT_ID_LEN};
pub use source::{CatFileSource, LooseObjectSource};
