//! # ECDSA Keys
//!
//! Key generation and the wire encoding of public keys.
//!
//! Moor signs with ECDSA over NIST P-256. The encoded form of a public key
//! is the SEC1 uncompressed point (`0x04 || X || Y`, 65 bytes) — that byte
//! string is what envelopes carry, what the signer-chain index is keyed by,
//! and what `next_public_key` pre-commitments compare against. Two keys are
//! "the same signer" exactly when their encoded bytes are equal.

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use thiserror::Error;

/// Errors from key material handling.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The encoded public key bytes are not a valid SEC1 point.
    #[error("public key did not decode")]
    MalformedKey,
}

/// Generate a fresh P-256 signing key from the OS entropy source.
pub fn generate_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Encode a public key as an uncompressed SEC1 point.
///
/// This is the canonical byte form used everywhere a public key appears in
/// the ledger: envelope fields, the signer-chain index, RPC responses.
pub fn encode_public_key(key: &VerifyingKey) -> Vec<u8> {
    key.to_encoded_point(false).as_bytes().to_vec()
}

/// Decode a SEC1-encoded public key.
///
/// # Errors
///
/// [`KeyError::MalformedKey`] if the bytes are not a valid point on the
/// curve (wrong length, wrong tag, or coordinates off-curve).
pub fn decode_public_key(bytes: &[u8]) -> Result<VerifyingKey, KeyError> {
    VerifyingKey::from_sec1_bytes(bytes).map_err(|_| KeyError::MalformedKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let key = generate_key();
        let encoded = encode_public_key(key.verifying_key());
        let decoded = decode_public_key(&encoded).expect("valid key must decode");
        assert_eq!(encode_public_key(&decoded), encoded);
    }

    #[test]
    fn encoded_form_is_uncompressed_sec1() {
        let key = generate_key();
        let encoded = encode_public_key(key.verifying_key());
        assert_eq!(encoded.len(), 65);
        assert_eq!(encoded[0], 0x04);
    }

    #[test]
    fn garbage_does_not_decode() {
        assert!(decode_public_key(b"not a key").is_err());
        assert!(decode_public_key(&[]).is_err());
        // Right length, wrong contents.
        assert!(decode_public_key(&[0x04; 65]).is_err());
    }
}
