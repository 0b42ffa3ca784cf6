//! Fundamental value types shared across the ledger.
//!
//! Two hash domains coexist in Moor and must never be confused:
//!
//! - [`Hash`] — 32 bytes, SHA-256. Identifies ledger objects: transactions,
//!   envelopes, blocks.
//! - [`ObjectId`] — 20 bytes, SHA-1. Identifies versioned-content objects
//!   (commits, trees, blobs, tags) inside packfiles, matching the format
//!   those objects are addressed by in the wild.
//!
//! Both are plain byte arrays. Equality is bytewise, ordering is
//! lexicographic, and the all-zero value is the designated "empty" sentinel
//! (genesis parent, end-of-chain marker, unset reference).

use std::fmt;

use thiserror::Error;

/// A 32-byte SHA-256 digest identifying a ledger object.
pub type Hash = [u8; 32];

/// A 20-byte SHA-1 digest identifying a versioned-content object.
pub type ObjectId = [u8; 20];

/// The empty ledger hash: parent of the genesis block, terminator of the
/// per-key envelope chain and of the transaction traversal order.
pub const EMPTY_HASH: Hash = [0u8; 32];

/// The empty object id, used for unborn refs in reference updates.
pub const EMPTY_OBJECT_ID: ObjectId = [0u8; 20];

/// Render a ledger hash as lowercase hex, the only external format
/// hashes appear in (JSON responses, logs).
pub fn hash_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Render an object id as lowercase hex.
pub fn object_id_hex(id: &ObjectId) -> String {
    hex::encode(id)
}

// ---------------------------------------------------------------------------
// CodecError
// ---------------------------------------------------------------------------

/// Failure to decode a canonical binary encoding.
///
/// Raised by the `decode` half of every encode/decode pair in the crate:
/// truncated input, an unknown variant discriminator, or trailing garbage
/// all end up here.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed binary encoding: {0}")]
    Malformed(String),
}

impl From<bincode::Error> for CodecError {
    fn from(err: bincode::Error) -> Self {
        CodecError::Malformed(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

/// Wrapper that displays a hash as hex without allocating eagerly.
/// Handy in `tracing` fields: `info!(block = %HexDisplay(&hash), ...)`.
pub struct HexDisplay<'a>(pub &'a [u8]);

impl fmt::Display for HexDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}
