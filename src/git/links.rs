//! Link discovery: which objects does a canonical form reference?

use std::collections::HashSet;

use gix_object::Kind;
use thiserror::Error;

use super::{
    canonical::CanonicalForm,
    objects::{ObjectId, OBJECT_ID_LEN},
};

#[derive(Debug, Error)]
pub enum LinkParseError {
    #[error("commit has no tree header")]
    MissingTree,
    #[error("tag has no object header")]
    MissingTarget,
    #[error("malformed {header} id {value:?}")]
    BadId { header: &'static str, value: String },
    #[error("malformed tree entry at offset {offset}: {reason}")]
    BadTreeEntry { offset: usize, reason: &'static str },
}

/// Objects referenced by `form`, each listed once, in order of first
/// appearance.
///
/// - commit: `tree` then every `parent`
/// - tree: every entry (subtrees, blobs and submodule commits)
/// - tag: the tagged `object`
/// - blob: nothing
pub fn extract_links(form: &CanonicalForm) -> Result<Vec<ObjectId>, LinkParseError> {
    let payload = form.payload();
    let links = match form.kind() {
        Kind::Commit => commit_links(payload)?,
        Kind::Tree => tree_links(payload)?,
        Kind::Tag => tag_links(payload)?,
        Kind::Blob => Vec::new(),
    };

    let mut seen = HashSet::with_capacity(links.len());
    Ok(links.into_iter().filter(|id| seen.insert(*id)).collect())
}

/// Header lines of a commit or tag: everything before the first blank line.
/// Continuation lines (gpgsig, mergetag) start with a space and never match
/// a header name.
fn header_lines(payload: &[u8]) -> impl Iterator<Item = &[u8]> {
    payload
        .split(|&b| b == b'\n')
        .take_while(|line| !line.is_empty())
}

fn header_id(line: &[u8], header: &'static str) -> Option<Result<ObjectId, LinkParseError>> {
    let value = line
        .strip_prefix(header.as_bytes())?
        .strip_prefix(b" ")?;
    Some(ObjectId::from_hex(value).map_err(|_| LinkParseError::BadId {
        header,
        value: String::from_utf8_lossy(value).into_owned(),
    }))
}

fn commit_links(payload: &[u8]) -> Result<Vec<ObjectId>, LinkParseError> {
    let mut tree = None;
    let mut parents = Vec::new();

    for line in header_lines(payload) {
        if let Some(id) = header_id(line, "tree") {
            let id = id?;
            if tree.is_none() {
                tree = Some(id);
            }
        } else if let Some(id) = header_id(line, "parent") {
            parents.push(id?);
        }
    }

    let tree = tree.ok_or(LinkParseError::MissingTree)?;
    let mut links = Vec::with_capacity(parents.len() + 1);
    links.push(tree);
    links.extend(parents);
    Ok(links)
}

fn tag_links(payload: &[u8]) -> Result<Vec<ObjectId>, LinkParseError> {
    for line in header_lines(payload) {
        if let Some(id) = header_id(line, "object") {
            return Ok(vec![id?]);
        }
    }
    Err(LinkParseError::MissingTarget)
}

/// Tree entries are `<mode> <name>\0<20-byte id>`, back to back.
fn tree_links(payload: &[u8]) -> Result<Vec<ObjectId>, LinkParseError> {
    let mut links = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let entry = &payload[offset..];

        let space = entry
            .iter()
            .position(|&b| b == b' ')
            .ok_or(LinkParseError::BadTreeEntry {
                offset,
                reason: "missing mode separator",
            })?;
        if space == 0 || !entry[..space].iter().all(|b| (b'0'..=b'7').contains(b)) {
            return Err(LinkParseError::BadTreeEntry {
                offset,
                reason: "mode is not octal",
            });
        }

        let null = entry[space..]
            .iter()
            .position(|&b| b == 0)
            .map(|pos| space + pos)
            .ok_or(LinkParseError::BadTreeEntry {
                offset,
                reason: "missing name terminator",
            })?;

        let id_start = null + 1;
        let id = entry
            .get(id_start..id_start + OBJECT_ID_LEN)
            .and_then(ObjectId::from_slice)
            .ok_or(LinkParseError::BadTreeEntry {
                offset,
                reason: "truncated object id",
            })?;

        links.push(id);
        offset += id_start + OBJECT_ID_LEN;
    }

    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::encode;

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const PARENT_A: &str = "1111111111111111111111111111111111111111";
    const PARENT_B: &str = "2222222222222222222222222222222222222222";

    fn id(hex: &str) -> ObjectId {
        hex.parse().unwrap()
    }

    fn form(kind: Kind, payload: &[u8]) -> CanonicalForm {
        encode(kind, payload.len() as u64, payload).unwrap()
    }

    fn tree_entry(mode: &str, name: &str, target: &ObjectId) -> Vec<u8> {
        let mut entry = format!("{} {}\0", mode, name).into_bytes();
        entry.extend_from_slice(target.as_bytes());
        entry
    }

    #[test]
    fn test_commit_tree_and_parents_collapse_duplicates() {
        let payload = format!(
            "tree {TREE}\nparent {PARENT_A}\nparent {PARENT_B}\nparent {PARENT_A}\n\
             author A <a@example.com> 1700000000 +0000\n\
             committer A <a@example.com> 1700000000 +0000\n\n\
             tree {PARENT_B} in the message is not a link\n"
        );
        let links = extract_links(&form(Kind::Commit, payload.as_bytes())).unwrap();
        assert_eq!(links, vec![id(TREE), id(PARENT_A), id(PARENT_B)]);
    }

    #[test]
    fn test_commit_signature_lines_are_ignored() {
        let payload = format!(
            "tree {TREE}\n\
             author A <a@example.com> 1700000000 +0000\n\
             committer A <a@example.com> 1700000000 +0000\n\
             gpgsig -----BEGIN PGP SIGNATURE-----\n \n parent {PARENT_A}\n -----END PGP SIGNATURE-----\n\n\
             signed\n"
        );
        let links = extract_links(&form(Kind::Commit, payload.as_bytes())).unwrap();
        assert_eq!(links, vec![id(TREE)]);
    }

    #[test]
    fn test_commit_without_tree_is_malformed() {
        let payload = format!("parent {PARENT_A}\n\nmessage\n");
        let err = extract_links(&form(Kind::Commit, payload.as_bytes())).unwrap_err();
        assert!(matches!(err, LinkParseError::MissingTree));
    }

    #[test]
    fn test_commit_with_bad_parent_hex() {
        let payload = format!("tree {TREE}\nparent nothex\n\nmessage\n");
        let err = extract_links(&form(Kind::Commit, payload.as_bytes())).unwrap_err();
        assert!(matches!(err, LinkParseError::BadId { header: "parent", .. }));
    }

    #[test]
    fn test_tree_entries() {
        let blob = id(PARENT_A);
        let subtree = id(TREE);
        let mut payload = tree_entry("100644", "README.md", &blob);
        payload.extend(tree_entry("40000", "src", &subtree));
        payload.extend(tree_entry("100755", "run.sh", &blob));

        let links = extract_links(&form(Kind::Tree, &payload)).unwrap();
        assert_eq!(links, vec![blob, subtree]);
    }

    #[test]
    fn test_empty_tree_has_no_links() {
        assert!(extract_links(&form(Kind::Tree, b"")).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_tree_entry() {
        let mut payload = tree_entry("100644", "a", &id(PARENT_A));
        payload.truncate(payload.len() - 3);
        let err = extract_links(&form(Kind::Tree, &payload)).unwrap_err();
        assert!(matches!(
            err,
            LinkParseError::BadTreeEntry {
                offset: 0,
                reason: "truncated object id"
            }
        ));
    }

    #[test]
    fn test_tree_entry_with_bad_mode() {
        let payload = tree_entry("10x644", "a", &id(PARENT_A));
        let err = extract_links(&form(Kind::Tree, &payload)).unwrap_err();
        assert!(matches!(err, LinkParseError::BadTreeEntry { .. }));
    }

    #[test]
    fn test_tag_target() {
        let payload = format!(
            "object {PARENT_B}\ntype commit\ntag v1.0\n\
             tagger A <a@example.com> 1700000000 +0000\n\nrelease\n"
        );
        let links = extract_links(&form(Kind::Tag, payload.as_bytes())).unwrap();
        assert_eq!(links, vec![id(PARENT_B)]);
    }

    #[test]
    fn test_tag_without_object() {
        let err = extract_links(&form(Kind::Tag, b"type commit\ntag v1\n\n")).unwrap_err();
        assert!(matches!(err, LinkParseError::MissingTarget));
    }

    #[test]
    fn test_blob_is_a_leaf() {
        let payload = format!("tree {TREE}\n");
        assert!(extract_links(&form(Kind::Blob, payload.as_bytes()))
            .unwrap()
            .is_empty());
    }
}
