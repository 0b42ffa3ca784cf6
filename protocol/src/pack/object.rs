//! # Versioned-Content Objects
//!
//! The four object kinds a packfile can carry: commits, trees, blobs, and
//! annotated tags. All four are content-addressed and immutable: the
//! 20-byte id is the SHA-1 of `"<type> <len>\0"` followed by the content,
//! so two objects are identical exactly when their ids are.
//!
//! The variant tag is data, not behavior — a tree and a blob with the same
//! bytes are different objects with different ids. Delta application
//! preserves the tag: patching a blob yields a blob.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::sha1_digest;
use crate::types::{object_id_hex, ObjectId};

/// Pack entry type code for a commit.
pub const OBJ_COMMIT: u8 = 1;
/// Pack entry type code for a tree.
pub const OBJ_TREE: u8 = 2;
/// Pack entry type code for a blob.
pub const OBJ_BLOB: u8 = 3;
/// Pack entry type code for a tag.
pub const OBJ_TAG: u8 = 4;
/// Pack entry type code for an offset-referenced delta.
pub const OBJ_OFS_DELTA: u8 = 6;
/// Pack entry type code for a hash-referenced delta.
pub const OBJ_REF_DELTA: u8 = 7;

/// A versioned-content object: a variant tag over raw content bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GitObject {
    Commit(Vec<u8>),
    Tree(Vec<u8>),
    Blob(Vec<u8>),
    Tag(Vec<u8>),
}

impl GitObject {
    /// Construct the variant matching a pack entry type code.
    ///
    /// Returns `None` for delta codes and anything else that is not a
    /// whole-object type.
    pub fn from_type_code(code: u8, bytes: Vec<u8>) -> Option<Self> {
        match code {
            OBJ_COMMIT => Some(GitObject::Commit(bytes)),
            OBJ_TREE => Some(GitObject::Tree(bytes)),
            OBJ_BLOB => Some(GitObject::Blob(bytes)),
            OBJ_TAG => Some(GitObject::Tag(bytes)),
            _ => None,
        }
    }

    /// The pack entry type code for this variant.
    pub fn type_code(&self) -> u8 {
        match self {
            GitObject::Commit(_) => OBJ_COMMIT,
            GitObject::Tree(_) => OBJ_TREE,
            GitObject::Blob(_) => OBJ_BLOB,
            GitObject::Tag(_) => OBJ_TAG,
        }
    }

    /// The canonical type name, as it appears in the hashed header.
    pub fn type_name(&self) -> &'static str {
        match self {
            GitObject::Commit(_) => "commit",
            GitObject::Tree(_) => "tree",
            GitObject::Blob(_) => "blob",
            GitObject::Tag(_) => "tag",
        }
    }

    /// The raw content bytes (what pack entries compress).
    pub fn bytes(&self) -> &[u8] {
        match self {
            GitObject::Commit(bytes)
            | GitObject::Tree(bytes)
            | GitObject::Blob(bytes)
            | GitObject::Tag(bytes) => bytes,
        }
    }

    /// A new object of the same variant with different content.
    ///
    /// This is how delta application types its output: the base's tag, the
    /// patched bytes.
    pub fn with_bytes(&self, bytes: Vec<u8>) -> Self {
        match self {
            GitObject::Commit(_) => GitObject::Commit(bytes),
            GitObject::Tree(_) => GitObject::Tree(bytes),
            GitObject::Blob(_) => GitObject::Blob(bytes),
            GitObject::Tag(_) => GitObject::Tag(bytes),
        }
    }

    /// The canonical serialized form: `"<type> <len>\0"` then the content.
    /// This is the SHA-1 preimage, not what packs store.
    pub fn canonical(&self) -> Vec<u8> {
        let content = self.bytes();
        let mut out = Vec::with_capacity(content.len() + 16);
        out.extend_from_slice(self.type_name().as_bytes());
        out.push(b' ');
        out.extend_from_slice(content.len().to_string().as_bytes());
        out.push(0);
        out.extend_from_slice(content);
        out
    }

    /// The 20-byte content address.
    pub fn id(&self) -> ObjectId {
        sha1_digest(&self.canonical())
    }
}

impl fmt::Display for GitObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.type_name(), object_id_hex(&self.id()))
    }
}
