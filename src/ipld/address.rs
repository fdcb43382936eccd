//! Content addresses (CIDs) for git objects in an IPLD store.
//!
//! A git object is stored under a CIDv1 with the `git-raw` codec and a SHA-1
//! multihash of its canonical form. The SHA-1 of the canonical form is the
//! git object id, so the address a correct store must report can be derived
//! from the id alone, without the round trip.

use std::{fmt, str::FromStr};

use cid::{multihash::Multihash, Cid};
use serde::{Serialize, Serializer};

use crate::{
    error::PushError,
    git::{CanonicalForm, ObjectId},
};

/// Multicodec code for `git-raw`
pub const GIT_RAW_CODEC: u64 = 0x78;
/// Multihash code for `sha1`
pub const SHA1_CODE: u64 = 0x11;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentAddress(Cid);

impl ContentAddress {
    /// Address a correct store reports for the object `id`
    pub fn for_object(id: &ObjectId) -> Self {
        let hash = Multihash::<64>::wrap(SHA1_CODE, id.as_bytes())
            .expect("a 20-byte digest fits in a 64-byte multihash");
        Self(Cid::new_v1(GIT_RAW_CODEC, hash))
    }

    /// Address computed from the canonical bytes themselves
    pub fn of_canonical(form: &CanonicalForm) -> Self {
        Self::for_object(&form.object_id())
    }

    pub fn cid(&self) -> &Cid {
        &self.0
    }

    /// Git object id behind this address, if it is a `git-raw`/SHA-1 CID
    pub fn object_id(&self) -> Option<ObjectId> {
        let hash = self.0.hash();
        if self.0.codec() != GIT_RAW_CODEC || hash.code() != SHA1_CODE {
            return None;
        }
        ObjectId::from_slice(hash.digest())
    }
}

impl From<Cid> for ContentAddress {
    fn from(cid: Cid) -> Self {
        Self(cid)
    }
}

impl FromStr for ContentAddress {
    type Err = cid::Error;

    /// Accepts any multibase encoding (and CIDv0), so addresses compare by
    /// value no matter how the store chose to print them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::try_from(s.trim()).map(Self)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentAddress({})", self.0)
    }
}

impl Serialize for ContentAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

/// Check the address the store reported for `id` against the expected one.
pub fn verify(
    id: &ObjectId,
    expected: &ContentAddress,
    reported: &ContentAddress,
) -> Result<(), PushError> {
    if expected != reported {
        return Err(PushError::AddressMismatch {
            id: *id,
            expected: *expected,
            reported: *reported,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cid::multibase::Base;
    use gix_object::Kind;

    use super::*;
    use crate::git::encode;

    fn id(hex: &str) -> ObjectId {
        hex.parse().unwrap()
    }

    #[test]
    fn test_address_from_id_matches_address_from_bytes() {
        let form = encode(Kind::Blob, 5, b"test\n").unwrap();
        let expected = ContentAddress::for_object(&id("9daeafb9864cf43055ae93beb0afd6c7d144bfa4"));
        assert_eq!(ContentAddress::of_canonical(&form), expected);
    }

    #[test]
    fn test_same_bytes_same_address() {
        let a = encode(Kind::Blob, 5, b"hello").unwrap();
        let b = encode(Kind::Blob, 5, b"hello").unwrap();
        let c = encode(Kind::Blob, 5, b"world").unwrap();
        assert_eq!(ContentAddress::of_canonical(&a), ContentAddress::of_canonical(&b));
        assert_ne!(ContentAddress::of_canonical(&a), ContentAddress::of_canonical(&c));
    }

    #[test]
    fn test_cid_layout() {
        let object = id("9daeafb9864cf43055ae93beb0afd6c7d144bfa4");
        let address = ContentAddress::for_object(&object);

        assert_eq!(address.cid().codec(), GIT_RAW_CODEC);
        assert_eq!(address.cid().hash().code(), SHA1_CODE);
        assert_eq!(address.cid().hash().digest(), object.as_bytes());
        assert_eq!(address.object_id(), Some(object));

        let text = address.to_string();
        assert!(text.starts_with('b'), "CIDv1 prints as base32: {}", text);
    }

    #[test]
    fn test_parse_accepts_any_multibase() {
        let address = ContentAddress::for_object(&id("4b825dc642cb6eb9a060e54bf8d69288fbee4904"));

        let base32: ContentAddress = address.to_string().parse().unwrap();
        assert_eq!(base32, address);

        let base58 = address.cid().to_string_of_base(Base::Base58Btc).unwrap();
        assert!(base58.starts_with('z'));
        let parsed: ContentAddress = format!("{}\n", base58).parse().unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("not a cid".parse::<ContentAddress>().is_err());
        assert!("".parse::<ContentAddress>().is_err());
    }

    #[test]
    fn test_verify() {
        let object = id("9daeafb9864cf43055ae93beb0afd6c7d144bfa4");
        let other = id("4b825dc642cb6eb9a060e54bf8d69288fbee4904");
        let expected = ContentAddress::for_object(&object);

        assert!(verify(&object, &expected, &expected).is_ok());

        let err = verify(&object, &expected, &ContentAddress::for_object(&other)).unwrap_err();
        match err {
            PushError::AddressMismatch {
                id,
                expected: e,
                reported,
            } => {
                assert_eq!(id, object);
                assert_eq!(e, expected);
                assert_eq!(reported.object_id(), Some(other));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
