//! # Transaction Model
//!
//! The four operations the ledger records, as one tagged enum:
//!
//! ```text
//! NameReservation  — commit to a repository name without revealing it
//! NameAllocation   — reveal the name; must match a prior reservation
//! NameDeallocation — release a name
//! ReferenceUpdate  — advance a named ref between two object ids
//! ```
//!
//! ## Canonical encoding
//!
//! `encode` is bincode over the enum: a variant discriminator followed by
//! the variant's fields in declaration order, strings and byte vectors
//! length-prefixed. The transaction hash is SHA-256 of exactly those bytes,
//! so the encoding is consensus-critical — field order and types are frozen.
//!
//! ## The reservation game
//!
//! Claiming a name is a two-step commit/reveal. First a `NameReservation`
//! carrying `SHA256(name || rand)` goes on chain: it proves you chose the
//! name at that point in time while revealing nothing. Once mined, a
//! `NameAllocation` from the same signer chain reveals `name` and `rand`;
//! anyone can recompute the digest and check it against the reservation.
//! Front-running a reservation requires inverting SHA-256. Good luck.
//!
//! ## Lifecycle
//!
//! Transactions are wrapped in a signed [`envelope::Envelope`], broadcast,
//! pooled, mined into a block, and persisted. A bare `Transaction` is inert
//! data; all authentication lives in the envelope.

pub mod envelope;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::TRANSACTION_VERSION;
use crate::crypto::hash::{sha256, sha256_multi};
use crate::types::{CodecError, Hash, HexDisplay, ObjectId};

pub use envelope::{Envelope, SignatureError};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A ledger operation, tagged by variant.
///
/// The bincode discriminator doubles as the wire/disk tag, so variant
/// order here is as frozen as the field layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    /// Commits to a repository name via `hashed_name = SHA256(name || rand)`.
    NameReservation {
        version: u32,
        hashed_name: Hash,
    },
    /// Reveals a previously reserved name together with its salt.
    NameAllocation {
        version: u32,
        name: String,
        rand: Vec<u8>,
    },
    /// Releases a previously allocated name.
    NameDeallocation {
        version: u32,
        name: String,
    },
    /// Advances `ref_name` in `repository` from `old` to `new`.
    ReferenceUpdate {
        version: u32,
        repository: String,
        #[serde(rename = "ref")]
        ref_name: String,
        old: ObjectId,
        new: ObjectId,
    },
}

/// The commitment digest a reservation stores and an allocation must match.
pub fn hashed_name(name: &str, rand: &[u8]) -> Hash {
    sha256_multi(&[name.as_bytes(), rand])
}

impl Transaction {
    /// Build a reservation for `name` with a fresh 32-byte salt.
    ///
    /// Returns the transaction and the salt; the caller must keep the salt
    /// to build the later [`Transaction::name_allocation`] reveal. Lose it
    /// and the name is locked forever.
    pub fn name_reservation(name: &str) -> (Self, Vec<u8>) {
        let mut rand = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut rand);
        let tx = Transaction::NameReservation {
            version: TRANSACTION_VERSION,
            hashed_name: hashed_name(name, &rand),
        };
        (tx, rand)
    }

    /// Build an allocation revealing `name` and the reservation salt.
    pub fn name_allocation(name: &str, rand: Vec<u8>) -> Self {
        Transaction::NameAllocation {
            version: TRANSACTION_VERSION,
            name: name.to_string(),
            rand,
        }
    }

    /// Build a deallocation releasing `name`.
    pub fn name_deallocation(name: &str) -> Self {
        Transaction::NameDeallocation {
            version: TRANSACTION_VERSION,
            name: name.to_string(),
        }
    }

    /// Build a reference update moving `ref_name` from `old` to `new`.
    pub fn reference_update(repository: &str, ref_name: &str, old: ObjectId, new: ObjectId) -> Self {
        Transaction::ReferenceUpdate {
            version: TRANSACTION_VERSION,
            repository: repository.to_string(),
            ref_name: ref_name.to_string(),
            old,
            new,
        }
    }

    /// Canonical binary encoding: discriminator, then fields in order.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a canonical encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// SHA-256 over the canonical encoding.
    pub fn hash(&self) -> Hash {
        sha256(&bincode::serialize(self).unwrap_or_default())
    }

    /// Structural validity: correct version and non-empty required fields.
    ///
    /// This is local validation only. Cross-transaction rules (an allocation
    /// matching its reservation, a ref update building on the current tip)
    /// belong to the block validator, which can see the chain.
    pub fn valid(&self) -> bool {
        match self {
            Transaction::NameReservation {
                version,
                hashed_name,
            } => *version == TRANSACTION_VERSION && hashed_name.iter().any(|b| *b != 0),
            Transaction::NameAllocation {
                version,
                name,
                rand,
            } => *version == TRANSACTION_VERSION && !name.is_empty() && !rand.is_empty(),
            Transaction::NameDeallocation { version, name } => {
                *version == TRANSACTION_VERSION && !name.is_empty()
            }
            Transaction::ReferenceUpdate {
                version,
                repository,
                ref_name,
                ..
            } => *version == TRANSACTION_VERSION && !repository.is_empty() && !ref_name.is_empty(),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transaction::NameReservation { hashed_name, .. } => {
                write!(f, "NSR {}", HexDisplay(hashed_name))
            }
            Transaction::NameAllocation { name, .. } => write!(f, "NAL {}", name),
            Transaction::NameDeallocation { name, .. } => write!(f, "NDL {}", name),
            Transaction::ReferenceUpdate {
                repository,
                ref_name,
                old,
                new,
                ..
            } => write!(
                f,
                "RUT {} {} {}:{}",
                repository,
                ref_name,
                HexDisplay(old),
                HexDisplay(new)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EMPTY_OBJECT_ID;

    #[test]
    fn reservation_commits_to_name_and_salt() {
        let (tx, rand) = Transaction::name_reservation("my-repo");
        assert_eq!(rand.len(), 32);
        match &tx {
            Transaction::NameReservation {
                version,
                hashed_name: h,
            } => {
                assert_eq!(*version, TRANSACTION_VERSION);
                assert_eq!(*h, hashed_name("my-repo", &rand));
            }
            other => panic!("wrong variant: {other}"),
        }
        assert!(tx.valid());
    }

    #[test]
    fn reservation_salts_are_unique() {
        let (tx1, _) = Transaction::name_reservation("repo");
        let (tx2, _) = Transaction::name_reservation("repo");
        assert_ne!(tx1.hash(), tx2.hash(), "salts must differ between reservations");
    }

    #[test]
    fn allocation_reveal_matches_reservation() {
        let (reservation, rand) = Transaction::name_reservation("repo");
        let allocation = Transaction::name_allocation("repo", rand.clone());
        let Transaction::NameReservation { hashed_name: h, .. } = reservation else {
            unreachable!()
        };
        assert_eq!(hashed_name("repo", &rand), h);
        assert!(allocation.valid());
    }

    #[test]
    fn encode_decode_roundtrip_all_variants() {
        let (reservation, rand) = Transaction::name_reservation("repo");
        let variants = vec![
            reservation,
            Transaction::name_allocation("repo", rand),
            Transaction::name_deallocation("repo"),
            Transaction::reference_update("repo", "refs/heads/master", EMPTY_OBJECT_ID, [7u8; 20]),
        ];
        for tx in variants {
            let encoded = tx.encode().expect("encode");
            let decoded = Transaction::decode(&encoded).expect("decode");
            assert_eq!(decoded, tx);
            assert_eq!(decoded.hash(), tx.hash());
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Transaction::decode(&[0xff, 0xfe, 0xfd]).is_err());
        assert!(Transaction::decode(&[]).is_err());
    }

    #[test]
    fn validity_rejects_wrong_version() {
        let tx = Transaction::NameDeallocation {
            version: 99,
            name: "repo".to_string(),
        };
        assert!(!tx.valid());
    }

    #[test]
    fn validity_rejects_empty_fields() {
        assert!(!Transaction::name_deallocation("").valid());
        assert!(!Transaction::name_allocation("repo", vec![]).valid());
        assert!(!Transaction::reference_update("", "refs/heads/master", [0; 20], [1; 20]).valid());
        assert!(!Transaction::reference_update("repo", "", [0; 20], [1; 20]).valid());
    }

    #[test]
    fn hashes_differ_across_variants() {
        let a = Transaction::name_deallocation("repo");
        let b = Transaction::name_allocation("repo", vec![1]);
        assert_ne!(a.hash(), b.hash());
    }
}
