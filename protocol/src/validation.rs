//! # Block Validation
//!
//! The acceptance gate for candidate blocks, shared by the mining loop
//! (before a `put_block`) and the sync path (before adopting a peer's
//! block). The storage engine deliberately stores whatever it is given;
//! this module is where "should we store it" lives.
//!
//! A candidate passes when:
//!
//! 1. its version is current;
//! 2. its header hash meets the difficulty target its own `bits` field
//!    declares (difficulty policy — which `bits` a block should carry —
//!    belongs to the mining loop, not this gate);
//! 3. its Merkle root matches the envelope list;
//! 4. every envelope verifies, wraps a structurally valid transaction,
//!    and extends its signer chain from the latest envelope the store has
//!    seen for that key (or from the empty hash for a new chain), with
//!    envelopes earlier in the same block counting as seen.
//!
//! The verdict is a value, not an error: rejection is a normal outcome
//! with a reason attached, and only storage failures propagate as errors.

use std::collections::HashMap;

use crate::block::Block;
use crate::config::BLOCK_VERSION;
use crate::storage::{DbResult, LedgerDb};
use crate::transaction::SignatureError;
use crate::types::{hash_hex, EMPTY_HASH};

/// The validator's answer for one candidate block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The block may be persisted.
    Ok,
    /// The block must not be persisted, and here is why.
    Reject(String),
}

impl Verdict {
    pub fn is_ok(&self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

/// Validate a candidate block against the rules above.
///
/// Only [`crate::storage::DbError`] values propagate; every protocol
/// violation comes back as [`Verdict::Reject`].
pub fn validate_block(db: &LedgerDb, block: &Block) -> DbResult<Verdict> {
    if block.version != BLOCK_VERSION {
        return Ok(Verdict::Reject(format!(
            "unsupported block version {}",
            block.version
        )));
    }

    if !block.meets_target() {
        return Ok(Verdict::Reject(format!(
            "header hash {} misses the target for bits {:#010x}",
            hash_hex(&block.hash()),
            block.bits
        )));
    }

    match block.compute_merkle_root() {
        Ok(root) if root == block.merkle_root => {}
        Ok(root) => {
            return Ok(Verdict::Reject(format!(
                "merkle root {} does not commit to the envelope list (expected {})",
                hash_hex(&block.merkle_root),
                hash_hex(&root)
            )));
        }
        Err(err) => return Ok(Verdict::Reject(format!("unencodable envelope: {err}"))),
    }

    // Signer chains may advance several times inside one block; envelopes
    // already checked here count as the latest for their key.
    let mut seen_in_block: HashMap<Vec<u8>, crate::types::Hash> = HashMap::new();

    for (index, envelope) in block.transactions.iter().enumerate() {
        if !envelope.transaction.valid() {
            return Ok(Verdict::Reject(format!(
                "envelope {index} wraps an invalid transaction: {}",
                envelope.transaction
            )));
        }

        match envelope.verify() {
            Ok(true) => {}
            Ok(false) => {
                return Ok(Verdict::Reject(format!(
                    "envelope {index} carries an invalid signature"
                )));
            }
            Err(SignatureError::MalformedKey) => {
                return Ok(Verdict::Reject(format!(
                    "envelope {index} carries an undecodable public key"
                )));
            }
            Err(err) => {
                return Ok(Verdict::Reject(format!("envelope {index}: {err}")));
            }
        }

        let expected = match seen_in_block.get(&envelope.public_key) {
            Some(hash) => *hash,
            None => db
                .get_previous_envelope_hash_for_public_key(&envelope.public_key)?
                .unwrap_or(EMPTY_HASH),
        };
        if envelope.previous_envelope_hash != expected {
            return Ok(Verdict::Reject(format!(
                "envelope {index} breaks its signer chain: links {} but the latest is {}",
                hash_hex(&envelope.previous_envelope_hash),
                hash_hex(&expected)
            )));
        }
        seen_in_block.insert(envelope.public_key.clone(), envelope.hash());
    }

    Ok(Verdict::Ok)
}
