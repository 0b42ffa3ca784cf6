//! # Cryptographic Primitives
//!
//! Everything that hashes or signs lives under this module:
//!
//! ```text
//! hash.rs — SHA-256 / double-SHA-256 / SHA-1, Merkle trees
//! keys.rs — P-256 ECDSA key generation and SEC1 public-key encoding
//! ```
//!
//! Signing itself is an envelope concern — see
//! [`crate::transaction::envelope`] — because the bytes being signed are
//! defined by the envelope's hash discipline, not by the key material.

pub mod hash;
pub mod keys;

pub use hash::{double_sha256, merkle_root, sha1_digest, sha256, sha256_multi};
pub use keys::{decode_public_key, encode_public_key, generate_key, KeyError};
