//! # Blocks
//!
//! A block batches signed envelopes under a proof-of-work header and links
//! to its predecessor by hash, forming the append-only chain.
//!
//! ## Header hashing
//!
//! The block hash is the classic double-SHA-256 construction:
//!
//! ```text
//! preimage = previous_block_hash || merkle_root
//!          || version (u32 LE) || timestamp (i64 LE)
//!          || bits (u32 LE)    || nonce (u32 LE)
//! hash     = SHA256( SHA256(preimage) written big-endian )
//! ```
//!
//! Field order and endianness are consensus-frozen; the tests pin the
//! digest of a known header byte-for-byte.
//!
//! ## Difficulty
//!
//! `bits` is the compact target encoding: top byte exponent, low 24 bits
//! mantissa, `target = mantissa * 2^(8*(exponent-3))`. A header satisfies
//! proof-of-work when its hash, read as a 256-bit big-endian integer, is
//! at most the target. [`crate::config::HIGHEST_TARGET`] is the easiest
//! difficulty the chain permits.
//!
//! ## Merkle commitment
//!
//! `merkle_root` commits to the ordered envelope list via a SHA-256 binary
//! tree over the canonical envelope encodings. An empty block commits to
//! the all-zero hash, distinct from `SHA256("")` on purpose: "no
//! transactions" is not the same statement as "one empty string".

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::BLOCK_VERSION;
use crate::crypto::hash::{merkle_root, sha256};
use crate::transaction::Envelope;
use crate::types::{hash_hex, CodecError, Hash};

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A proof-of-work block: header fields plus the ordered envelope list.
///
/// The canonical encoding (and therefore the disk/wire format) is bincode
/// over the fields in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block format version.
    pub version: u32,
    /// Hash of the predecessor block; the empty hash for genesis.
    pub previous_block_hash: Hash,
    /// SHA-256 Merkle root over the canonical envelope encodings.
    pub merkle_root: Hash,
    /// Unix timestamp (seconds) at construction.
    pub timestamp: i64,
    /// Compact difficulty target.
    pub bits: u32,
    /// Proof-of-work nonce, incremented by the miner.
    pub nonce: u32,
    /// The envelopes committed to by `merkle_root`, in order.
    pub transactions: Vec<Envelope>,
}

impl Block {
    /// Assemble a candidate block on top of `previous_block_hash`.
    ///
    /// Computes the Merkle root over the given envelopes, stamps the
    /// current time, and leaves `nonce` at zero for the miner.
    pub fn new(
        previous_block_hash: Hash,
        bits: u32,
        transactions: Vec<Envelope>,
    ) -> Result<Self, CodecError> {
        let encoded: Vec<Vec<u8>> = transactions
            .iter()
            .map(|envelope| envelope.encode())
            .collect::<Result<_, _>>()?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;

        Ok(Block {
            version: BLOCK_VERSION,
            previous_block_hash,
            merkle_root: merkle_root(&encoded),
            timestamp,
            bits,
            nonce: 0,
            transactions,
        })
    }

    /// The double-SHA-256 header hash. See the module docs for the exact
    /// preimage layout.
    pub fn hash(&self) -> Hash {
        let mut preimage = Vec::with_capacity(84);
        preimage.extend_from_slice(&self.previous_block_hash);
        preimage.extend_from_slice(&self.merkle_root);
        preimage.extend_from_slice(&self.version.to_le_bytes());
        preimage.extend_from_slice(&self.timestamp.to_le_bytes());
        preimage.extend_from_slice(&self.bits.to_le_bytes());
        preimage.extend_from_slice(&self.nonce.to_le_bytes());

        let inner = sha256(&preimage);
        sha256(&inner)
    }

    /// Recompute the Merkle root from the envelope list.
    ///
    /// Validators compare this against the stored `merkle_root`.
    pub fn compute_merkle_root(&self) -> Result<Hash, CodecError> {
        let encoded: Vec<Vec<u8>> = self
            .transactions
            .iter()
            .map(|envelope| envelope.encode())
            .collect::<Result<_, _>>()?;
        Ok(merkle_root(&encoded))
    }

    /// Does the header hash satisfy the difficulty encoded in `bits`?
    pub fn meets_target(&self) -> bool {
        self.hash() <= target_from_bits(self.bits)
    }

    /// Canonical binary encoding.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Compact target
// ---------------------------------------------------------------------------

/// Expand a compact `bits` value into the full 256-bit big-endian target.
///
/// The top byte is a base-256 exponent, the low 24 bits the mantissa:
/// `target = mantissa * 2^(8*(exponent-3))`. Mantissa bytes that shift
/// past either end of the 256-bit range are dropped.
pub fn target_from_bits(bits: u32) -> [u8; 32] {
    let exponent = (bits >> 24) as usize;
    let mantissa = [
        ((bits >> 16) & 0xff) as u8,
        ((bits >> 8) & 0xff) as u8,
        (bits & 0xff) as u8,
    ];

    let mut target = [0u8; 32];
    for (i, byte) in mantissa.iter().enumerate() {
        if let Some(pos) = 32usize.checked_sub(exponent).map(|base| base + i) {
            if pos < 32 {
                target[pos] = *byte;
            }
        }
    }
    target
}

// ---------------------------------------------------------------------------
// JSON view
// ---------------------------------------------------------------------------

/// The block as the RPC surface presents it: hex hashes, transaction
/// count instead of the full envelope list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockSummary {
    pub version: u32,
    pub previous_block_hash: String,
    pub merkle_root: String,
    pub timestamp: i64,
    pub bits: u32,
    pub nonce: u32,
    pub num_transactions: usize,
    pub hash: String,
}

impl From<&Block> for BlockSummary {
    fn from(block: &Block) -> Self {
        BlockSummary {
            version: block.version,
            previous_block_hash: hash_hex(&block.previous_block_hash),
            merkle_root: hash_hex(&block.merkle_root),
            timestamp: block.timestamp,
            bits: block.bits,
            nonce: block.nonce,
            num_transactions: block.transactions.len(),
            hash: hash_hex(&block.hash()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HIGHEST_TARGET;
    use crate::crypto::keys::generate_key;
    use crate::transaction::Transaction;
    use crate::types::EMPTY_HASH;

    fn signed_envelope(name: &str) -> Envelope {
        let key = generate_key();
        let (tx, _) = Transaction::name_reservation(name);
        let mut envelope = Envelope::new(EMPTY_HASH, tx);
        envelope.sign(&key).expect("signing");
        envelope
    }

    /// A header with every field pinned, for digest comparisons.
    fn pinned_header(nonce: u32) -> Block {
        Block {
            version: 1,
            previous_block_hash: EMPTY_HASH,
            merkle_root: EMPTY_HASH,
            timestamp: 1_234_567_890,
            bits: HIGHEST_TARGET,
            nonce,
            transactions: Vec::new(),
        }
    }

    #[test]
    fn header_hash_pinned_vector() {
        assert_eq!(
            hex::encode(pinned_header(0).hash()),
            "fec727b0900e5b8418e13d4deff57d9474fc3fc9bb8dff3991ce63904e8b4e2f"
        );
    }

    #[test]
    fn nonce_changes_header_hash() {
        assert_eq!(
            hex::encode(pinned_header(7).hash()),
            "f7de07fa586b33598f6e3b90f363a72e74b4fe83195f29a0e234a2e7bba47c83"
        );
        assert_ne!(pinned_header(0).hash(), pinned_header(7).hash());
    }

    #[test]
    fn genesis_block_has_empty_merkle_root() {
        let genesis = Block::new(EMPTY_HASH, HIGHEST_TARGET, vec![]).expect("genesis");
        assert_eq!(genesis.merkle_root, EMPTY_HASH);
        assert_eq!(genesis.previous_block_hash, EMPTY_HASH);
        assert_eq!(genesis.version, BLOCK_VERSION);
        assert_eq!(genesis.nonce, 0);
    }

    #[test]
    fn merkle_root_matches_standalone_computation() {
        let envelopes = vec![signed_envelope("a"), signed_envelope("b"), signed_envelope("c")];
        let encoded: Vec<Vec<u8>> = envelopes.iter().map(|e| e.encode().unwrap()).collect();

        let block = Block::new(EMPTY_HASH, HIGHEST_TARGET, envelopes).expect("block");
        assert_eq!(block.merkle_root, merkle_root(&encoded));
        assert_eq!(block.compute_merkle_root().unwrap(), block.merkle_root);
    }

    #[test]
    fn encode_decode_roundtrip_preserves_hash() {
        let block = Block::new(EMPTY_HASH, HIGHEST_TARGET, vec![signed_envelope("repo")])
            .expect("block");
        let encoded = block.encode().expect("encode");
        let decoded = Block::decode(&encoded).expect("decode");
        assert_eq!(decoded, block);
        assert_eq!(decoded.hash(), block.hash());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Block::decode(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn highest_target_expansion() {
        let target = target_from_bits(HIGHEST_TARGET);
        let mut expected = [0u8; 32];
        expected[4] = 0xff;
        expected[5] = 0xff;
        assert_eq!(target, expected);
    }

    #[test]
    fn small_exponent_shifts_mantissa_down() {
        // exponent 3 places the mantissa in the lowest three bytes.
        let target = target_from_bits(0x03_12_34_56);
        let mut expected = [0u8; 32];
        expected[29] = 0x12;
        expected[30] = 0x34;
        expected[31] = 0x56;
        assert_eq!(target, expected);
    }

    #[test]
    fn exponent_below_three_divides_mantissa() {
        // target = mantissa * 2^-8 = mantissa >> 8.
        let target = target_from_bits(0x02_12_34_56);
        let mut expected = [0u8; 32];
        expected[30] = 0x12;
        expected[31] = 0x34;
        assert_eq!(target, expected);
    }

    #[test]
    fn everything_meets_the_all_ones_target() {
        // exponent 32, mantissa 0xffffff: the first three bytes are 0xff,
        // larger than any double-SHA256 output in practice for this header.
        let mut block = pinned_header(0);
        block.bits = 0x20ffffff;
        assert!(block.meets_target());
    }

    #[test]
    fn nothing_meets_the_zero_target() {
        let mut block = pinned_header(0);
        block.bits = 0x03000000;
        assert!(!block.meets_target());
    }

    #[test]
    fn summary_renders_hex() {
        let block = Block::new(EMPTY_HASH, HIGHEST_TARGET, vec![]).expect("block");
        let summary = BlockSummary::from(&block);
        assert_eq!(summary.hash, hex::encode(block.hash()));
        assert_eq!(summary.num_transactions, 0);
        assert_eq!(summary.previous_block_hash, hex::encode(EMPTY_HASH));
    }
}
