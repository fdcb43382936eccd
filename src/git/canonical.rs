//! Canonical `"<kind> <size>\0<payload>"` form of git objects.
//!
//! This is the byte sequence git hashes to produce an object id, and the
//! exact input the DAG store expects for the `git-raw` codec.

use std::fmt;

use gix_object::Kind;
use sha1::{Digest, Sha1};
use thiserror::Error;

use super::objects::{ObjectId, RawObject, OBJECT_ID_LEN};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported object kind {0:?}")]
    UnsupportedKind(String),
    #[error("declared size {declared} does not match payload length {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
    #[error("malformed object header: {0}")]
    MalformedHeader(String),
}

/// Map a git type word (`commit`, `tree`, `blob`, `tag`) to its kind.
pub fn parse_kind(word: &[u8]) -> Result<Kind, EncodeError> {
    match word {
        b"commit" => Ok(Kind::Commit),
        b"tree" => Ok(Kind::Tree),
        b"blob" => Ok(Kind::Blob),
        b"tag" => Ok(Kind::Tag),
        _ => Err(EncodeError::UnsupportedKind(
            String::from_utf8_lossy(word).into_owned(),
        )),
    }
}

/// Type word used in the canonical header
pub fn kind_word(kind: Kind) -> &'static str {
    match kind {
        Kind::Commit => "commit",
        Kind::Tree => "tree",
        Kind::Blob => "blob",
        Kind::Tag => "tag",
    }
}

/// Canonical bytes of one git object, header included.
#[derive(Clone, PartialEq, Eq)]
pub struct CanonicalForm {
    kind: Kind,
    header_len: usize,
    bytes: Vec<u8>,
}

/// Build the canonical form for `kind` with the declared `size`.
///
/// The declared size must match the payload: a mismatch means the store
/// handed back a truncated or corrupt object, and the resulting bytes could
/// never hash to the object's id.
pub fn encode(kind: Kind, size: u64, payload: &[u8]) -> Result<CanonicalForm, EncodeError> {
    if size != payload.len() as u64 {
        return Err(EncodeError::SizeMismatch {
            declared: size,
            actual: payload.len() as u64,
        });
    }

    Ok(CanonicalForm::new(kind, payload))
}

impl CanonicalForm {
    /// Canonical form of `payload`, sized by its length
    pub fn new(kind: Kind, payload: &[u8]) -> Self {
        let header = format!("{} {}\0", kind_word(kind), payload.len());
        let mut bytes = Vec::with_capacity(header.len() + payload.len());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(payload);

        Self {
            kind,
            header_len: header.len(),
            bytes,
        }
    }

    /// Validate bytes that are already in canonical form (for example a
    /// decompressed loose object).
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EncodeError> {
        let null_pos = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| EncodeError::MalformedHeader("no null terminator".to_string()))?;

        let header = &bytes[..null_pos];
        let space = header
            .iter()
            .position(|&b| b == b' ')
            .ok_or_else(|| {
                EncodeError::MalformedHeader(String::from_utf8_lossy(header).into_owned())
            })?;

        let kind = parse_kind(&header[..space])?;
        let size: u64 = std::str::from_utf8(&header[space + 1..])
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                EncodeError::MalformedHeader(String::from_utf8_lossy(header).into_owned())
            })?;

        let actual = (bytes.len() - null_pos - 1) as u64;
        if size != actual {
            return Err(EncodeError::SizeMismatch {
                declared: size,
                actual,
            });
        }

        Ok(Self {
            kind,
            header_len: null_pos + 1,
            bytes,
        })
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Payload without the header
    pub fn payload(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Git object id: SHA-1 over the whole canonical form
    pub fn object_id(&self) -> ObjectId {
        let mut hasher = Sha1::new();
        hasher.update(&self.bytes);
        let mut digest = [0u8; OBJECT_ID_LEN];
        digest.copy_from_slice(&hasher.finalize());
        ObjectId::from_bytes(digest)
    }

    pub fn to_raw(&self) -> RawObject {
        RawObject::new(self.kind, self.payload().to_vec())
    }
}

impl AsRef<[u8]> for CanonicalForm {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for CanonicalForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalForm")
            .field("kind", &self.kind)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_form_is_exact() {
        let form = encode(Kind::Blob, 5, b"hello").unwrap();
        assert_eq!(form.as_bytes(), b"blob 5\0hello");
        assert_eq!(form.payload(), b"hello");
        assert_eq!(form.kind(), Kind::Blob);
    }

    #[test]
    fn test_every_kind_word() {
        assert_eq!(encode(Kind::Commit, 2, b"ab").unwrap().as_bytes(), b"commit 2\0ab");
        assert_eq!(encode(Kind::Tree, 0, b"").unwrap().as_bytes(), b"tree 0\0");
        assert_eq!(encode(Kind::Tag, 3, b"xyz").unwrap().as_bytes(), b"tag 3\0xyz");
    }

    #[test]
    fn test_payload_is_not_modified() {
        let payload = b"line one\r\n\0binary\xff tail ";
        let form = encode(Kind::Blob, payload.len() as u64, payload).unwrap();
        assert_eq!(form.payload(), payload);
        let header = format!("blob {}\0", payload.len());
        assert_eq!(&form.as_bytes()[..header.len()], header.as_bytes());
        assert_eq!(form.len(), header.len() + payload.len());
    }

    #[test]
    fn test_size_mismatch_is_an_error() {
        let err = encode(Kind::Blob, 6, b"hello").unwrap_err();
        assert!(matches!(
            err,
            EncodeError::SizeMismatch {
                declared: 6,
                actual: 5
            }
        ));
    }

    #[test]
    fn test_unknown_kind_word() {
        let err = parse_kind(b"ofs-delta").unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedKind(ref word) if word == "ofs-delta"));
        assert_eq!(parse_kind(b"tree").unwrap(), Kind::Tree);
    }

    #[test]
    fn test_object_id_matches_git() {
        // `echo test | git hash-object --stdin`
        let form = encode(Kind::Blob, 5, b"test\n").unwrap();
        assert_eq!(
            form.object_id().to_string(),
            "9daeafb9864cf43055ae93beb0afd6c7d144bfa4"
        );
        // the empty tree
        assert_eq!(
            CanonicalForm::new(Kind::Tree, b"").object_id().to_string(),
            "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
        );
    }

    #[test]
    fn test_from_bytes_matches_encode() {
        let encoded = encode(Kind::Blob, 5, b"hello").unwrap();
        let parsed = CanonicalForm::from_bytes(b"blob 5\0hello".to_vec()).unwrap();
        assert_eq!(encoded, parsed);
        assert_eq!(parsed.to_raw(), RawObject::new(Kind::Blob, b"hello".to_vec()));
    }

    #[test]
    fn test_from_bytes_rejects_bad_headers() {
        assert!(matches!(
            CanonicalForm::from_bytes(b"blob 5 hello".to_vec()),
            Err(EncodeError::MalformedHeader(_))
        ));
        assert!(matches!(
            CanonicalForm::from_bytes(b"blob five\0hello".to_vec()),
            Err(EncodeError::MalformedHeader(_))
        ));
        assert!(matches!(
            CanonicalForm::from_bytes(b"blob 4\0hello".to_vec()),
            Err(EncodeError::SizeMismatch { .. })
        ));
        assert!(matches!(
            CanonicalForm::from_bytes(b"widget 5\0hello".to_vec()),
            Err(EncodeError::UnsupportedKind(_))
        ));
    }
}
