// Copyright (c) 2026 Moor Contributors. MIT License.
// See LICENSE for details.

//! # Moor Protocol — Core Library
//!
//! Moor is a ledger that anchors source-code repositories: who owns a
//! name, and where each of its refs points, recorded as signed
//! transactions, mined into proof-of-work blocks, and chained into a
//! public append-only log.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the ledger's actual
//! correctness boundary:
//!
//! - **crypto** — SHA-256 / SHA-1 hashing, Merkle trees, P-256 ECDSA keys.
//! - **transaction** — The four ledger operations and the signed envelopes
//!   that carry them through signer chains.
//! - **block** — Double-SHA-256 headers, compact difficulty targets,
//!   Merkle commitments over envelope lists.
//! - **pack** — The v2 packfile codec for versioned-content objects,
//!   including both delta reference modes and forward-reference resolution.
//! - **storage** — sled-backed persistence with atomic multi-index block
//!   writes and the traversal queries built on them.
//! - **validation** — The accept/reject gate for candidate blocks.
//! - **events** — Typed broadcast topics announcing ledger changes.
//! - **miner** — The status cell and nonce search the mining loop drives.
//! - **config** — Protocol constants. All of them.
//!
//! ## Design Philosophy
//!
//! 1. Consensus bytes are frozen: hashing preimages, canonical encodings,
//!    and the pack format are pinned by test vectors, not by convention.
//! 2. The storage engine stores; the validator judges. Mixing the two is
//!    how chains end up with unexplainable state.
//! 3. Producers never wait for consumers. Slow subscribers lose events,
//!    miners do not lose blocks.

pub mod block;
pub mod config;
pub mod crypto;
pub mod events;
pub mod miner;
pub mod pack;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod validation;

pub use block::{Block, BlockSummary};
pub use events::LedgerEvents;
pub use miner::{find_nonce, MinerState, MinerStatus};
pub use pack::{GitObject, PackError, Packfile};
pub use storage::{DbError, DbResult, LedgerDb, Repository, RepositoryStatus};
pub use transaction::{Envelope, Transaction};
pub use types::{Hash, ObjectId, EMPTY_HASH, EMPTY_OBJECT_ID};
pub use validation::{validate_block, Verdict};
