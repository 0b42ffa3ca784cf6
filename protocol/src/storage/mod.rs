//! # Storage
//!
//! Persistence for the ledger: blocks, the transaction indexes that make
//! them queryable, the pending-transaction pool, and the repository
//! registry derived from confirmed name transactions.
//!
//! ```text
//! db.rs — sled-backed LedgerDb: one keyspace, prefixed logical tables,
//!          atomic multi-index put_block
//! ```

pub mod db;

pub use db::{DbError, DbResult, LedgerDb, Repository, RepositoryStatus};
