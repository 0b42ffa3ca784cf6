//! # Protocol Constants
//!
//! Every magic number in Moor lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong.
//!
//! Changing any value in the "Consensus" section invalidates every chain
//! ever produced by this code. Treat them as frozen.

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Current block format version.
pub const BLOCK_VERSION: u32 = 1;

/// Version carried by every transaction variant.
pub const TRANSACTION_VERSION: u32 = 1;

/// The difficulty new candidate blocks are assembled with, in compact
/// "bits" form. Top byte is the exponent, low 24 bits the mantissa:
/// `target = mantissa * 2^(8*(exponent-3))`.
///
/// The chain runs at this fixed difficulty; nothing rejects a block for
/// declaring an easier `bits` — the validator only checks the header hash
/// against the target the block itself declares.
pub const HIGHEST_TARGET: u32 = 0x1d00ffff;

// ---------------------------------------------------------------------------
// Packfile format
// ---------------------------------------------------------------------------

/// Magic bytes opening every packfile.
pub const PACK_MAGIC: [u8; 4] = *b"PACK";

/// Pack format version written by the encoder. The decoder accepts whatever
/// version the header declares; only v2 semantics are implemented.
pub const PACK_VERSION: u32 = 2;

// ---------------------------------------------------------------------------
// Storage engine
// ---------------------------------------------------------------------------

/// How many times a transient key-value store error is retried before the
/// operation surfaces a storage failure to the caller.
pub const KV_RETRY_LIMIT: u32 = 3;

// ---------------------------------------------------------------------------
// Event hub
// ---------------------------------------------------------------------------

/// Per-topic broadcast buffer. Subscribers that fall more than this many
/// messages behind start losing the oldest ones; producers never block.
pub const EVENT_BUFFER: usize = 100;
