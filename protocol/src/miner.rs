//! # Miner Contract
//!
//! The mining control loop itself lives outside this crate; what lives
//! here is the contract it shares with the rest of the process:
//!
//! - [`MinerState`] — the process-wide status cell. The control loop is
//!   the only writer; RPC handlers read it to report what the node is
//!   doing.
//! - [`find_nonce`] — the inner proof-of-work search, bounded so callers
//!   control how long one attempt may run before re-checking for a new
//!   chain head or a stop request.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::block::Block;

/// What the mining loop is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinerStatus {
    /// No mining in progress.
    Idle,
    /// Searching for a nonce.
    Mining,
    /// A stop was requested; the loop is winding down.
    Stopping,
}

impl fmt::Display for MinerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerStatus::Idle => write!(f, "idle"),
            MinerStatus::Mining => write!(f, "mining"),
            MinerStatus::Stopping => write!(f, "stopping"),
        }
    }
}

/// Shared miner status cell. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct MinerState {
    status: Arc<RwLock<MinerStatus>>,
}

impl MinerState {
    pub fn new() -> Self {
        MinerState {
            status: Arc::new(RwLock::new(MinerStatus::Idle)),
        }
    }

    /// The current status. A snapshot: it may change the moment the lock
    /// drops.
    pub fn status(&self) -> MinerStatus {
        *self.status.read()
    }

    /// Transition the status. Only the mining control loop should call
    /// this.
    pub fn set_status(&self, status: MinerStatus) {
        *self.status.write() = status;
    }
}

impl Default for MinerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Increment `block.nonce` until the header meets its target, giving up
/// after `max_attempts` increments.
///
/// Returns whether a winning nonce was found; the block is left at the
/// winning nonce on success and at the last tried nonce otherwise.
pub fn find_nonce(block: &mut Block, max_attempts: u64) -> bool {
    for _ in 0..=max_attempts {
        if block.meets_target() {
            return true;
        }
        block.nonce = block.nonce.wrapping_add(1);
    }
    false
}
