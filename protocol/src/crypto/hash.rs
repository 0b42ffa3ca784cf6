//! # Hashing Primitives
//!
//! Two hash functions, two jobs, no exceptions:
//!
//! - **SHA-256** — ledger objects. Transaction hashes, envelope hashes,
//!   block hashes (doubled), Merkle trees. 32-byte output, [`crate::types::Hash`].
//! - **SHA-1** — versioned-content objects and packfile checksums. Yes,
//!   SHA-1 is broken for adversarial collisions; the pack format we speak
//!   is defined over it, so interoperability wins. 20-byte output,
//!   [`crate::types::ObjectId`].
//!
//! The double-SHA-256 construction used for block hashes follows the
//! convention shared by every chain this one will ever be compared against,
//! and the test vectors pin it bit-for-bit.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::types::{Hash, ObjectId, EMPTY_HASH};

/// SHA-256 of the input, as a fixed 32-byte array.
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 fed from multiple slices without concatenating them first.
/// Equivalent to hashing the concatenation; skips the temporary buffer.
pub fn sha256_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))` — the block-hash construction.
pub fn double_sha256(data: &[u8]) -> Hash {
    sha256(&sha256(data))
}

/// SHA-1 of the input, as a fixed 20-byte array.
pub fn sha1_digest(data: &[u8]) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

// ---------------------------------------------------------------------------
// Merkle tree
// ---------------------------------------------------------------------------

/// SHA-256 binary Merkle root over a list of encoded items.
///
/// Leaves are `SHA256(item)`. Each level pairs adjacent nodes as
/// `SHA256(left || right)`, duplicating the last node when a level has an
/// odd count. A single item yields its leaf hash; the empty list yields
/// the all-zero hash — explicitly, not `SHA256("")`.
pub fn merkle_root(items: &[Vec<u8>]) -> Hash {
    if items.is_empty() {
        return EMPTY_HASH;
    }

    let mut level: Vec<Hash> = items.iter().map(|item| sha256(item)).collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity((level.len() + 1) / 2);
        for pair in level.chunks(2) {
            let left = &pair[0];
            let right = if pair.len() == 2 { &pair[1] } else { &pair[0] };
            next.push(sha256_multi(&[left.as_slice(), right.as_slice()]));
        }
        level = next;
    }

    level[0]
}
