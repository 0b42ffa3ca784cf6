//! # LedgerDb — Persistent Storage Engine
//!
//! All on-disk state flows through this module, built on sled's embedded
//! key-value store. One keyspace, namespaced by key prefix:
//!
//! | Prefix / key      | Key suffix           | Value                        |
//! |-------------------|----------------------|------------------------------|
//! | `block:`          | block hash           | `bincode(Block)`             |
//! | `tx-block:`       | envelope hash        | containing block hash        |
//! | `tx-next:`        | envelope hash        | next envelope hash           |
//! | `prev-envelope:`  | encoded public key   | latest envelope hash by key  |
//! | `pending-tx:`     | envelope hash        | `bincode(Envelope)`          |
//! | `repo:`           | repository name      | `bincode(Repository)`        |
//! | `last-block`      | —                    | chain head hash              |
//! | `last-tx`         | —                    | latest persisted envelope    |
//! | `repo-list`       | —                    | `bincode(Vec<String>)`       |
//!
//! "Transaction hash" in these tables always means the envelope hash: the
//! envelope is the signed unit the chain orders, and it is what every
//! query identifies a transaction by.
//!
//! ## Atomicity
//!
//! `put_block` assembles every write — the block record, all per-envelope
//! index updates, repository side effects, the head advance — into a
//! single `sled::Batch`. Readers observe none of a block's effects or all
//! of them. Confirmed puts are additionally serialized under a mutex, and
//! a put whose parent is no longer the head fails with
//! [`DbError::ConcurrentWriteConflict`] so the caller can re-validate and
//! retry.
//!
//! ## Transient errors
//!
//! sled operations are retried up to [`KV_RETRY_LIMIT`] times before the
//! failure surfaces as [`DbError::Storage`]. Decoding failures are never
//! retried; a value that did not decode once will not decode twice.

use std::fmt;
use std::path::Path;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sled::Batch;
use thiserror::Error;
use tracing::{info, warn};

use crate::block::Block;
use crate::config::KV_RETRY_LIMIT;
use crate::events::LedgerEvents;
use crate::transaction::{hashed_name, Envelope, Transaction};
use crate::types::{CodecError, Hash, HexDisplay, EMPTY_HASH};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

const PREFIX_BLOCK: &[u8] = b"block:";
const PREFIX_TX_BLOCK: &[u8] = b"tx-block:";
const PREFIX_TX_NEXT: &[u8] = b"tx-next:";
const PREFIX_PREV_ENVELOPE: &[u8] = b"prev-envelope:";
const PREFIX_PENDING_TX: &[u8] = b"pending-tx:";
const PREFIX_REPO: &[u8] = b"repo:";

const KEY_LAST_BLOCK: &[u8] = b"last-block";
const KEY_LAST_TX: &[u8] = b"last-tx";
const KEY_REPO_LIST: &[u8] = b"repo-list";

fn key(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + suffix.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(suffix);
    out
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// The underlying key-value store failed after retries.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A stored value failed to decode. The database is damaged or was
    /// written by something that is not this code.
    #[error("corrupt record: {0}")]
    Codec(#[from] CodecError),

    /// The chain head advanced between validation and this confirmed put.
    /// Re-validate against the new head and retry.
    #[error("chain head advanced during put")]
    ConcurrentWriteConflict,
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Repository registry records
// ---------------------------------------------------------------------------

/// Lifecycle state of a repository name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepositoryStatus {
    /// A reservation is on chain; the name itself is still hidden.
    Pending,
    /// The name was revealed by an allocation and is in use.
    Active,
}

impl fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryStatus::Pending => write!(f, "pending"),
            RepositoryStatus::Active => write!(f, "active"),
        }
    }
}

/// A registered repository name.
///
/// While only the reservation is on chain, the record is keyed (and named)
/// by the hex commitment digest; the allocation replaces it with the real
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub status: RepositoryStatus,
    /// Envelope hash of the transaction that produced this record.
    pub name_allocation_tx: Hash,
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// The persistent storage engine.
///
/// Thread-safe: sled handles concurrent access internally, and confirmed
/// head advances are serialized by `head_lock`. Share across threads via
/// `Arc<LedgerDb>`.
pub struct LedgerDb {
    db: sled::Db,
    events: LedgerEvents,
    /// Serializes confirmed `put_block` calls so head checks and head
    /// advances cannot interleave.
    head_lock: Mutex<()>,
}

impl LedgerDb {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, events: LedgerEvents) -> DbResult<Self> {
        let db = sled::open(path).map_err(|err| DbError::Storage(err.to_string()))?;
        Ok(LedgerDb {
            db,
            events,
            head_lock: Mutex::new(()),
        })
    }

    /// An in-memory database that vanishes on drop. For tests.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|err| DbError::Storage(err.to_string()))?;
        Ok(LedgerDb {
            db,
            events: LedgerEvents::new(),
            head_lock: Mutex::new(()),
        })
    }

    /// The event hub this database publishes into.
    pub fn events(&self) -> &LedgerEvents {
        &self.events
    }

    // -- Blocks -------------------------------------------------------------

    /// Persist a block and all of its index effects atomically.
    ///
    /// For every envelope in the block this writes the envelope→block
    /// back-pointer, extends the global transaction order, updates the
    /// signer-chain index, drops the envelope from the pending pool, and
    /// applies the repository side effect of its transaction. When
    /// `confirmed`, the chain head advances to this block and
    /// subscribers are notified.
    ///
    /// The envelope contents are stored as given; whether they *should*
    /// have been accepted is the validator's call, made before this one.
    pub fn put_block(&self, block: &Block, confirmed: bool) -> DbResult<()> {
        let _guard = self.head_lock.lock();

        let block_hash = block.hash();
        if confirmed {
            if let Some(head) = self.get_last_block_hash()? {
                if block.previous_block_hash != head {
                    return Err(DbError::ConcurrentWriteConflict);
                }
            }
        }

        let mut batch = Batch::default();
        batch.insert(key(PREFIX_BLOCK, &block_hash), block.encode()?);

        let mut last_tx = self.read_hash(KEY_LAST_TX)?;
        let mut repo_list = self.read_repo_list()?;
        let mut changed_repos: Vec<String> = Vec::new();

        for envelope in &block.transactions {
            let tx_hash = envelope.hash();

            batch.insert(key(PREFIX_TX_BLOCK, &tx_hash), &block_hash[..]);
            if let Some(previous) = last_tx {
                batch.insert(key(PREFIX_TX_NEXT, &previous), &tx_hash[..]);
            }
            batch.insert(KEY_LAST_TX, &tx_hash[..]);
            last_tx = Some(tx_hash);

            batch.insert(key(PREFIX_PREV_ENVELOPE, &envelope.public_key), &tx_hash[..]);
            batch.remove(key(PREFIX_PENDING_TX, &tx_hash));

            apply_repository_effect(
                &mut batch,
                &mut repo_list,
                &mut changed_repos,
                envelope,
                &tx_hash,
            )?;
        }

        batch.insert(KEY_REPO_LIST, bincode::serialize(&repo_list).map_err(CodecError::from)?);
        if confirmed {
            batch.insert(KEY_LAST_BLOCK, &block_hash[..]);
        }

        self.with_retries("put_block", || self.db.apply_batch(batch.clone()))?;
        self.with_retries("flush", || self.db.flush().map(|_| ()))?;

        info!(
            block = %HexDisplay(&block_hash),
            confirmed,
            transactions = block.transactions.len(),
            "block persisted"
        );

        if confirmed {
            self.events.publish_block(block);
            for name in changed_repos {
                self.events.publish_repository_changed(&name);
            }
        }
        Ok(())
    }

    /// Fetch a block by hash.
    pub fn get_block(&self, hash: &Hash) -> DbResult<Option<Block>> {
        match self.read(&key(PREFIX_BLOCK, hash))? {
            Some(bytes) => Ok(Some(Block::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Hash of the current chain head, if any block was confirmed.
    pub fn get_last_block_hash(&self) -> DbResult<Option<Hash>> {
        self.read_hash(KEY_LAST_BLOCK)
    }

    /// The current chain head block.
    pub fn get_last_block(&self) -> DbResult<Option<Block>> {
        match self.get_last_block_hash()? {
            Some(hash) => self.get_block(&hash),
            None => Ok(None),
        }
    }

    // -- Pending pool ---------------------------------------------------------

    /// Stage an envelope in the pending pool and announce it.
    pub fn put_transaction(&self, envelope: &Envelope) -> DbResult<()> {
        let tx_hash = envelope.hash();
        let encoded = envelope.encode()?;
        self.with_retries("put_transaction", || {
            self.db
                .insert(key(PREFIX_PENDING_TX, &tx_hash), encoded.as_slice())
                .map(|_| ())
        })?;
        self.events.publish_envelope(envelope);
        Ok(())
    }

    /// Fetch a pending envelope by hash.
    pub fn get_transaction(&self, hash: &Hash) -> DbResult<Option<Envelope>> {
        match self.read(&key(PREFIX_PENDING_TX, hash))? {
            Some(bytes) => Ok(Some(Envelope::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Drop a pending envelope. Removing an absent hash is not an error.
    pub fn delete_transaction(&self, hash: &Hash) -> DbResult<()> {
        self.with_retries("delete_transaction", || {
            self.db.remove(key(PREFIX_PENDING_TX, hash)).map(|_| ())
        })
    }

    /// Every envelope currently staged in the pending pool.
    pub fn list_pending_transactions(&self) -> DbResult<Vec<Envelope>> {
        let mut pending = Vec::new();
        for entry in self.db.scan_prefix(PREFIX_PENDING_TX) {
            let (_, value) = entry.map_err(|err| DbError::Storage(err.to_string()))?;
            pending.push(Envelope::decode(&value)?);
        }
        Ok(pending)
    }

    // -- Transaction queries --------------------------------------------------

    /// Hash of the block containing the given envelope, if confirmed into
    /// any persisted block.
    pub fn get_transaction_block(&self, tx_hash: &Hash) -> DbResult<Option<Block>> {
        match self.read_hash(&key(PREFIX_TX_BLOCK, tx_hash))? {
            Some(block_hash) => self.get_block(&block_hash),
            None => Ok(None),
        }
    }

    /// Number of blocks from the envelope's containing block to the chain
    /// head, inclusive. Zero when the envelope is unknown, pool-only, or
    /// its block is not on the confirmed chain.
    pub fn get_transaction_confirmations(&self, tx_hash: &Hash) -> DbResult<usize> {
        let Some(containing) = self.read_hash(&key(PREFIX_TX_BLOCK, tx_hash))? else {
            return Ok(0);
        };
        let Some(head) = self.get_last_block_hash()? else {
            return Ok(0);
        };

        let mut current = head;
        let mut count = 1;
        loop {
            if current == containing {
                return Ok(count);
            }
            let Some(block) = self.get_block(&current)? else {
                return Ok(0);
            };
            if block.previous_block_hash == EMPTY_HASH {
                // Walked past genesis without finding the block: it is off
                // the confirmed chain.
                return Ok(0);
            }
            current = block.previous_block_hash;
            count += 1;
        }
    }

    /// The envelope that chronologically follows the given one, or the
    /// empty hash when it is the latest the store knows.
    pub fn get_next_transaction_hash(&self, tx_hash: &Hash) -> DbResult<Hash> {
        Ok(self
            .read_hash(&key(PREFIX_TX_NEXT, tx_hash))?
            .unwrap_or(EMPTY_HASH))
    }

    /// Hash of the most recent envelope signed by the given encoded public
    /// key, per the signer-chain index.
    pub fn get_previous_envelope_hash_for_public_key(
        &self,
        encoded_public_key: &[u8],
    ) -> DbResult<Option<Hash>> {
        self.read_hash(&key(PREFIX_PREV_ENVELOPE, encoded_public_key))
    }

    // -- Repository registry --------------------------------------------------

    /// All registered repository names, in registration order.
    pub fn list_repositories(&self) -> DbResult<Vec<String>> {
        self.read_repo_list()
    }

    /// Fetch one repository record by name.
    pub fn get_repository(&self, name: &str) -> DbResult<Option<Repository>> {
        match self.read(&key(PREFIX_REPO, name.as_bytes()))? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).map_err(CodecError::from)?,
            )),
            None => Ok(None),
        }
    }

    // -- Internals ------------------------------------------------------------

    fn read(&self, full_key: &[u8]) -> DbResult<Option<sled::IVec>> {
        self.with_retries("read", || self.db.get(full_key))
    }

    fn read_hash(&self, full_key: &[u8]) -> DbResult<Option<Hash>> {
        match self.read(full_key)? {
            Some(bytes) => {
                let hash: Hash = bytes.as_ref().try_into().map_err(|_| {
                    DbError::Storage(format!(
                        "index value under {:?} is not a 32-byte hash",
                        String::from_utf8_lossy(full_key)
                    ))
                })?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    fn read_repo_list(&self) -> DbResult<Vec<String>> {
        match self.read(KEY_REPO_LIST)? {
            Some(bytes) => Ok(bincode::deserialize(&bytes).map_err(CodecError::from)?),
            None => Ok(Vec::new()),
        }
    }

    /// Run a sled operation, retrying transient failures a bounded number
    /// of times before surfacing a storage error.
    fn with_retries<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut() -> sled::Result<T>,
    ) -> DbResult<T> {
        let mut attempt = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt > KV_RETRY_LIMIT {
                        return Err(DbError::Storage(err.to_string()));
                    }
                    warn!(operation, attempt, error = %err, "transient store error, retrying");
                }
            }
        }
    }
}

/// The repository-registry side effect of one confirmed envelope.
///
/// - A reservation registers the hex commitment digest as a `Pending`
///   record: visible evidence that *some* name is claimed, nothing more.
/// - An allocation registers the revealed name as `Active` and retires the
///   matching pending record.
/// - A deallocation removes the record.
fn apply_repository_effect(
    batch: &mut Batch,
    repo_list: &mut Vec<String>,
    changed: &mut Vec<String>,
    envelope: &Envelope,
    tx_hash: &Hash,
) -> DbResult<()> {
    match &envelope.transaction {
        Transaction::NameReservation {
            hashed_name: digest,
            ..
        } => {
            let placeholder = hex::encode(digest);
            let record = Repository {
                name: placeholder.clone(),
                status: RepositoryStatus::Pending,
                name_allocation_tx: *tx_hash,
            };
            batch.insert(
                key(PREFIX_REPO, placeholder.as_bytes()),
                bincode::serialize(&record).map_err(CodecError::from)?,
            );
            if !repo_list.contains(&placeholder) {
                repo_list.push(placeholder.clone());
            }
            changed.push(placeholder);
        }

        Transaction::NameAllocation { name, rand, .. } => {
            let record = Repository {
                name: name.clone(),
                status: RepositoryStatus::Active,
                name_allocation_tx: *tx_hash,
            };
            batch.insert(
                key(PREFIX_REPO, name.as_bytes()),
                bincode::serialize(&record).map_err(CodecError::from)?,
            );

            let placeholder = hex::encode(hashed_name(name, rand));
            if let Some(position) = repo_list.iter().position(|n| n == &placeholder) {
                repo_list.remove(position);
                batch.remove(key(PREFIX_REPO, placeholder.as_bytes()));
            }
            if !repo_list.contains(name) {
                repo_list.push(name.clone());
            }
            changed.push(name.clone());
        }

        Transaction::NameDeallocation { name, .. } => {
            batch.remove(key(PREFIX_REPO, name.as_bytes()));
            repo_list.retain(|n| n != name);
            changed.push(name.clone());
        }

        Transaction::ReferenceUpdate { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HIGHEST_TARGET;
    use crate::crypto::keys::{encode_public_key, generate_key};
    use p256::ecdsa::SigningKey;

    // -- Helpers ------------------------------------------------------------

    /// Three chained envelopes by one signer: reserve a name, allocate it,
    /// then update a ref in it.
    fn sample_envelopes() -> (Vec<Envelope>, SigningKey) {
        let signer = generate_key();

        let (reservation, rand) = Transaction::name_reservation("my-new-repository");
        let mut e1 = Envelope::new(EMPTY_HASH, reservation);
        e1.sign(&signer).expect("sign e1");

        let mut e2 = Envelope::new(
            e1.hash(),
            Transaction::name_allocation("my-new-repository", rand),
        );
        e2.sign(&signer).expect("sign e2");

        let mut e3 = Envelope::new(
            e2.hash(),
            Transaction::reference_update("my-new-repository", "refs/heads/master", [0; 20], [7; 20]),
        );
        e3.sign(&signer).expect("sign e3");

        (vec![e1, e2, e3], signer)
    }

    fn block_with(previous: Hash, envelopes: Vec<Envelope>) -> Block {
        Block::new(previous, HIGHEST_TARGET, envelopes).expect("block")
    }

    // -- Block and index tests ----------------------------------------------

    #[test]
    fn put_block_then_get_by_hash() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes);

        db.put_block(&block, false).unwrap();

        let fetched = db.get_block(&block.hash()).unwrap().expect("block exists");
        assert_eq!(fetched, block);
        assert_eq!(fetched.hash(), block.hash());
    }

    #[test]
    fn transactions_point_back_at_their_block() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes.clone());

        db.put_block(&block, false).unwrap();

        for envelope in &envelopes {
            let containing = db
                .get_transaction_block(&envelope.hash())
                .unwrap()
                .expect("envelope indexed");
            assert_eq!(containing.hash(), block.hash());
        }
    }

    #[test]
    fn unconfirmed_put_does_not_advance_head() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        db.put_block(&block_with(EMPTY_HASH, envelopes), false).unwrap();
        assert!(db.get_last_block_hash().unwrap().is_none());
    }

    #[test]
    fn confirmations_count_to_head_inclusive() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();

        for envelope in &envelopes {
            assert_eq!(
                db.get_transaction_confirmations(&envelope.hash()).unwrap(),
                0,
                "nothing confirmed yet"
            );
        }

        let first = block_with(EMPTY_HASH, envelopes.clone());
        db.put_block(&first, true).unwrap();
        for envelope in &envelopes {
            assert_eq!(db.get_transaction_confirmations(&envelope.hash()).unwrap(), 1);
        }

        let (more, _) = sample_envelopes();
        let second = block_with(first.hash(), more);
        db.put_block(&second, true).unwrap();
        for envelope in &envelopes {
            assert_eq!(db.get_transaction_confirmations(&envelope.hash()).unwrap(), 2);
        }
    }

    #[test]
    fn pool_only_envelope_has_zero_confirmations() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        db.put_transaction(&envelopes[0]).unwrap();
        assert_eq!(
            db.get_transaction_confirmations(&envelopes[0].hash()).unwrap(),
            0
        );
    }

    #[test]
    fn signer_chain_index_tracks_latest_envelope() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, signer) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes.clone());
        db.put_block(&block, false).unwrap();

        let encoded = encode_public_key(signer.verifying_key());
        let latest = db
            .get_previous_envelope_hash_for_public_key(&encoded)
            .unwrap()
            .expect("signer is indexed");
        assert_eq!(latest, envelopes[2].hash(), "last envelope in block order wins");

        let stranger = generate_key();
        assert!(db
            .get_previous_envelope_hash_for_public_key(&encode_public_key(stranger.verifying_key()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn signer_chain_index_advances_across_blocks() {
        let db = LedgerDb::open_temporary().unwrap();
        let signer = generate_key();

        let (reservation, _) = Transaction::name_reservation("repo");
        let mut e1 = Envelope::new(EMPTY_HASH, reservation);
        e1.sign(&signer).unwrap();
        let first = block_with(EMPTY_HASH, vec![e1.clone()]);
        db.put_block(&first, true).unwrap();

        let encoded = encode_public_key(signer.verifying_key());
        assert_eq!(
            db.get_previous_envelope_hash_for_public_key(&encoded).unwrap(),
            Some(e1.hash())
        );

        let mut e2 = Envelope::new(e1.hash(), Transaction::name_deallocation("repo"));
        e2.sign(&signer).unwrap();
        let second = block_with(first.hash(), vec![e2.clone()]);
        db.put_block(&second, true).unwrap();

        assert_eq!(
            db.get_previous_envelope_hash_for_public_key(&encoded).unwrap(),
            Some(e2.hash())
        );
    }

    #[test]
    fn transaction_traversal_order() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes.clone());
        db.put_block(&block, false).unwrap();

        assert_eq!(
            db.get_next_transaction_hash(&envelopes[0].hash()).unwrap(),
            envelopes[1].hash()
        );
        assert_eq!(
            db.get_next_transaction_hash(&envelopes[1].hash()).unwrap(),
            envelopes[2].hash()
        );
        assert_eq!(
            db.get_next_transaction_hash(&envelopes[2].hash()).unwrap(),
            EMPTY_HASH,
            "the latest envelope has no successor"
        );
    }

    #[test]
    fn transaction_traversal_spans_blocks() {
        let db = LedgerDb::open_temporary().unwrap();
        let (first_envelopes, _) = sample_envelopes();
        let (second_envelopes, _) = sample_envelopes();

        let first = block_with(EMPTY_HASH, first_envelopes.clone());
        db.put_block(&first, true).unwrap();
        let second = block_with(first.hash(), second_envelopes.clone());
        db.put_block(&second, true).unwrap();

        assert_eq!(
            db.get_next_transaction_hash(&first_envelopes[2].hash()).unwrap(),
            second_envelopes[0].hash(),
            "order continues across block boundaries"
        );
    }

    #[test]
    fn concurrent_confirmed_put_on_stale_head_conflicts() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();

        let winner = block_with(EMPTY_HASH, envelopes);
        db.put_block(&winner, true).unwrap();

        // A competing block still built on the empty hash: its view of the
        // head is stale.
        let (other, _) = sample_envelopes();
        let loser = block_with(EMPTY_HASH, other);
        assert!(matches!(
            db.put_block(&loser, true),
            Err(DbError::ConcurrentWriteConflict)
        ));

        // Rebased on the real head it goes through.
        let (rebased, _) = sample_envelopes();
        let retry = block_with(winner.hash(), rebased);
        db.put_block(&retry, true).unwrap();
        assert_eq!(db.get_last_block_hash().unwrap(), Some(retry.hash()));
    }

    // -- Pending pool tests ---------------------------------------------------

    #[test]
    fn pending_pool_put_get_delete() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        let envelope = &envelopes[0];

        db.put_transaction(envelope).unwrap();
        let fetched = db
            .get_transaction(&envelope.hash())
            .unwrap()
            .expect("staged envelope");
        assert_eq!(&fetched, envelope);

        db.delete_transaction(&envelope.hash()).unwrap();
        assert!(db.get_transaction(&envelope.hash()).unwrap().is_none());
    }

    #[test]
    fn put_block_clears_included_envelopes_from_pool() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        for envelope in &envelopes {
            db.put_transaction(envelope).unwrap();
        }
        assert_eq!(db.list_pending_transactions().unwrap().len(), 3);

        db.put_block(&block_with(EMPTY_HASH, envelopes), true).unwrap();
        assert!(db.list_pending_transactions().unwrap().is_empty());
    }

    // -- Repository registry tests --------------------------------------------

    #[test]
    fn reservation_registers_pending_placeholder() {
        let db = LedgerDb::open_temporary().unwrap();
        let signer = generate_key();
        let (reservation, _) = Transaction::name_reservation("secret-name");
        let Transaction::NameReservation { hashed_name: digest, .. } = reservation.clone() else {
            unreachable!()
        };
        let mut envelope = Envelope::new(EMPTY_HASH, reservation);
        envelope.sign(&signer).unwrap();

        db.put_block(&block_with(EMPTY_HASH, vec![envelope]), true).unwrap();

        let placeholder = hex::encode(digest);
        let record = db
            .get_repository(&placeholder)
            .unwrap()
            .expect("pending record");
        assert_eq!(record.status, RepositoryStatus::Pending);
        assert_eq!(db.list_repositories().unwrap(), vec![placeholder]);
        assert!(
            db.get_repository("secret-name").unwrap().is_none(),
            "the name itself stays hidden until allocation"
        );
    }

    #[test]
    fn allocation_activates_and_retires_placeholder() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, _) = sample_envelopes();
        let allocation_hash = envelopes[1].hash();

        db.put_block(&block_with(EMPTY_HASH, envelopes), true).unwrap();

        let record = db
            .get_repository("my-new-repository")
            .unwrap()
            .expect("active record");
        assert_eq!(record.status, RepositoryStatus::Active);
        assert_eq!(record.name, "my-new-repository");
        assert_eq!(record.name_allocation_tx, allocation_hash);
        assert_eq!(
            db.list_repositories().unwrap(),
            vec!["my-new-repository".to_string()],
            "the placeholder is retired by the reveal"
        );
    }

    #[test]
    fn deallocation_removes_the_record() {
        let db = LedgerDb::open_temporary().unwrap();
        let (envelopes, signer) = sample_envelopes();
        let last_hash = envelopes[2].hash();
        let first = block_with(EMPTY_HASH, envelopes);
        db.put_block(&first, true).unwrap();

        let mut dealloc = Envelope::new(
            last_hash,
            Transaction::name_deallocation("my-new-repository"),
        );
        dealloc.sign(&signer).unwrap();
        db.put_block(&block_with(first.hash(), vec![dealloc]), true).unwrap();

        assert!(db.get_repository("my-new-repository").unwrap().is_none());
        assert!(db.list_repositories().unwrap().is_empty());
    }

    // -- Events and durability ------------------------------------------------

    #[test]
    fn confirmed_put_publishes_block_and_repo_events() {
        let db = LedgerDb::open_temporary().unwrap();
        let mut blocks = db.events().subscribe_blocks();
        let mut repos = db.events().subscribe_repositories();

        let (envelopes, _) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes);
        db.put_block(&block, true).unwrap();

        assert_eq!(blocks.try_recv().expect("block event").hash(), block.hash());
        assert!(repos.try_recv().is_ok(), "repository changes announced");
    }

    #[test]
    fn unconfirmed_put_stays_silent() {
        let db = LedgerDb::open_temporary().unwrap();
        let mut blocks = db.events().subscribe_blocks();

        let (envelopes, _) = sample_envelopes();
        db.put_block(&block_with(EMPTY_HASH, envelopes), false).unwrap();
        assert!(blocks.try_recv().is_err());
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (envelopes, _) = sample_envelopes();
        let block = block_with(EMPTY_HASH, envelopes);

        {
            let db = LedgerDb::open(dir.path(), LedgerEvents::new()).unwrap();
            db.put_block(&block, true).unwrap();
        }

        let db = LedgerDb::open(dir.path(), LedgerEvents::new()).unwrap();
        assert_eq!(db.get_last_block_hash().unwrap(), Some(block.hash()));
        assert!(db.get_block(&block.hash()).unwrap().is_some());
        assert!(db.get_repository("my-new-repository").unwrap().is_some());
    }
}
