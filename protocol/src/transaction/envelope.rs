//! # Signed Transaction Envelopes
//!
//! An [`Envelope`] wraps a [`Transaction`] with everything needed to
//! authenticate it and to place it in a per-signer chain:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ previous_envelope_hash   ← link to signer's  │
//! │                            prior envelope    │
//! │ signature_r, signature_s ← ECDSA over hash() │
//! │ public_key               ← signer (SEC1)     │
//! │ next_public_key          ← who signs next    │
//! │ transaction              ← the payload       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## The signer chain
//!
//! For a given public key P, the envelopes signed by P form a linked list:
//! each one names its predecessor by hash, and each one pre-commits to the
//! key that must sign the successor via `next_public_key`. A fresh envelope
//! commits to its own key (same signer continues); announcing a different
//! `next_public_key` before signing hands the chain over — key rotation
//! without a central registry.
//!
//! The envelope hash covers the transaction hash, the predecessor link, and
//! the next-key pre-commitment, so none of the three can be swapped after
//! signing.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crypto::hash::sha256_multi;
use crate::crypto::keys::{decode_public_key, encode_public_key};
use crate::types::{CodecError, Hash, HexDisplay};

use super::Transaction;

/// Errors from envelope signing and verification.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The envelope's stored public key is not a decodable SEC1 point.
    #[error("public key did not decode")]
    MalformedKey,

    /// The signing operation itself failed.
    #[error("signing failed")]
    SigningFailed,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A transaction bound to a signer chain and carrying its ECDSA signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Hash of the latest envelope previously signed by this signer chain,
    /// or the empty hash for a chain's first envelope.
    pub previous_envelope_hash: Hash,
    /// ECDSA signature scalar r, big-endian with leading zeros stripped.
    pub signature_r: Vec<u8>,
    /// ECDSA signature scalar s, big-endian with leading zeros stripped.
    pub signature_s: Vec<u8>,
    /// SEC1-encoded public key of the signer. Set by [`Envelope::sign`].
    pub public_key: Vec<u8>,
    /// SEC1-encoded public key that must sign this chain's next envelope.
    pub next_public_key: Vec<u8>,
    /// The wrapped transaction.
    pub transaction: Transaction,
}

impl Envelope {
    /// Wrap a transaction, linking it to the signer's previous envelope.
    ///
    /// The key fields start empty; [`Envelope::sign`] fills them in.
    pub fn new(previous_envelope_hash: Hash, transaction: Transaction) -> Self {
        Envelope {
            previous_envelope_hash,
            signature_r: Vec::new(),
            signature_s: Vec::new(),
            public_key: Vec::new(),
            next_public_key: Vec::new(),
            transaction,
        }
    }

    /// The envelope hash: `SHA256(tx.hash || previous_envelope_hash ||
    /// next_public_key)`.
    ///
    /// The signature scalars and the current `public_key` are deliberately
    /// outside the hash — the signature covers the hash, not the other way
    /// around, and the signer's identity is authenticated by the signature
    /// itself.
    pub fn hash(&self) -> Hash {
        sha256_multi(&[
            &self.transaction.hash(),
            &self.previous_envelope_hash,
            &self.next_public_key,
        ])
    }

    /// Sign the envelope, establishing the signer and the next-key
    /// pre-commitment.
    ///
    /// In order:
    /// 1. the signer's public key is encoded;
    /// 2. if `next_public_key` is unset or equal to the current
    ///    `public_key`, it becomes the signer's own key — a fresh envelope
    ///    commits to itself as the next signer;
    /// 3. `public_key` becomes the signer's key;
    /// 4. r and s are computed over the (now final) envelope hash.
    ///
    /// Re-signing with a different key is allowed and replaces the signer;
    /// a pre-set, distinct `next_public_key` survives signing, which is how
    /// a chain announces a handover.
    pub fn sign(&mut self, key: &SigningKey) -> Result<(), SignatureError> {
        let encoded = encode_public_key(key.verifying_key());

        if self.next_public_key.is_empty() || self.next_public_key == self.public_key {
            self.next_public_key = encoded.clone();
        }
        self.public_key = encoded;

        let digest = self.hash();
        let signature: Signature = key
            .sign_prehash(&digest)
            .map_err(|_| SignatureError::SigningFailed)?;
        let (r, s) = signature.split_bytes();
        self.signature_r = strip_leading_zeros(r.as_slice());
        self.signature_s = strip_leading_zeros(s.as_slice());
        Ok(())
    }

    /// Verify the stored signature over the envelope hash.
    ///
    /// Returns `Ok(false)` for a wrong or out-of-range signature, and
    /// [`SignatureError::MalformedKey`] when `public_key` cannot be decoded
    /// at all — a structurally broken envelope, not merely a bad signature.
    pub fn verify(&self) -> Result<bool, SignatureError> {
        let key = decode_public_key(&self.public_key).map_err(|_| SignatureError::MalformedKey)?;

        let (Some(r), Some(s)) = (
            pad_scalar(&self.signature_r),
            pad_scalar(&self.signature_s),
        ) else {
            return Ok(false);
        };
        let Ok(signature) = Signature::from_scalars(r, s) else {
            return Ok(false);
        };

        Ok(key.verify_prehash(&self.hash(), &signature).is_ok())
    }

    /// Canonical binary encoding (bincode, fields in declaration order).
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", HexDisplay(&self.hash()), self.transaction)
    }
}

/// Minimal big-endian form of a signature scalar.
fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

/// Left-pad a stored scalar back to the 32 bytes P-256 expects.
/// `None` if the stored bytes are too long to be a P-256 scalar.
fn pad_scalar(bytes: &[u8]) -> Option<[u8; 32]> {
    if bytes.len() > 32 {
        return None;
    }
    let mut padded = [0u8; 32];
    padded[32 - bytes.len()..].copy_from_slice(bytes);
    Some(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::generate_key;
    use crate::types::EMPTY_HASH;

    fn reservation_envelope() -> Envelope {
        let (tx, _) = Transaction::name_reservation("my-new-repository");
        Envelope::new(EMPTY_HASH, tx)
    }

    #[test]
    fn sign_then_verify() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");
        assert!(envelope.verify().expect("verification"));
    }

    #[test]
    fn fresh_envelope_commits_to_own_key() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");
        assert_eq!(envelope.public_key, envelope.next_public_key);
        assert_eq!(envelope.public_key, encode_public_key(key.verifying_key()));
    }

    #[test]
    fn preset_next_key_survives_signing() {
        let signer = generate_key();
        let successor = generate_key();
        let mut envelope = reservation_envelope();
        envelope.next_public_key = encode_public_key(successor.verifying_key());
        envelope.sign(&signer).expect("signing");

        assert_eq!(
            envelope.next_public_key,
            encode_public_key(successor.verifying_key()),
            "a distinct pre-set next key is a handover announcement"
        );
        assert_eq!(envelope.public_key, encode_public_key(signer.verifying_key()));
        assert!(envelope.verify().expect("verification"));
    }

    #[test]
    fn tampered_transaction_fails_verification() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");

        envelope.transaction = Transaction::name_deallocation("my-new-repository");
        assert!(!envelope.verify().expect("verification runs"));
    }

    #[test]
    fn tampered_chain_link_fails_verification() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");

        envelope.previous_envelope_hash[0] ^= 0x01;
        assert!(!envelope.verify().expect("verification runs"));
    }

    #[test]
    fn tampered_signature_fails_verification() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");

        if let Some(byte) = envelope.signature_s.last_mut() {
            *byte ^= 0xff;
        }
        assert!(!envelope.verify().expect("verification runs"));
    }

    #[test]
    fn malformed_public_key_is_an_error_not_false() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");

        envelope.public_key = b"garbage".to_vec();
        assert!(matches!(envelope.verify(), Err(SignatureError::MalformedKey)));
    }

    #[test]
    fn chained_envelopes_link_by_hash() {
        let key = generate_key();
        let (reservation, rand) = Transaction::name_reservation("repo");
        let mut first = Envelope::new(EMPTY_HASH, reservation);
        first.sign(&key).expect("signing");

        let mut second = Envelope::new(first.hash(), Transaction::name_allocation("repo", rand));
        second.sign(&key).expect("signing");

        assert_eq!(second.previous_envelope_hash, first.hash());
        assert!(second.verify().expect("verification"));
    }

    #[test]
    fn encode_decode_roundtrip_preserves_hash() {
        let key = generate_key();
        let mut envelope = reservation_envelope();
        envelope.sign(&key).expect("signing");

        let encoded = envelope.encode().expect("encode");
        let decoded = Envelope::decode(&encoded).expect("decode");
        assert_eq!(decoded, envelope);
        assert_eq!(decoded.hash(), envelope.hash());
        assert!(decoded.verify().expect("verification"));
    }

    #[test]
    fn scalar_padding_roundtrip() {
        assert_eq!(strip_leading_zeros(&[0, 0, 5, 9]), vec![5, 9]);
        assert_eq!(strip_leading_zeros(&[0, 0]), Vec::<u8>::new());
        let padded = pad_scalar(&[5, 9]).expect("fits");
        assert_eq!(&padded[30..], &[5, 9]);
        assert!(pad_scalar(&[1u8; 33]).is_none());
    }
}
