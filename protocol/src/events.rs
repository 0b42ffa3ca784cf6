//! # Ledger Event Hub
//!
//! Typed publish/subscribe channels announcing what the ledger just did:
//! a block persisted, an envelope accepted into the pool, a repository
//! record changed.
//!
//! The hub is an explicit value, created once at startup and handed to
//! whoever needs it — no process-global router hiding in a static. Each
//! topic is a bounded [`tokio::sync::broadcast`] channel: publishing never
//! blocks, and a subscriber that falls more than [`EVENT_BUFFER`] messages
//! behind loses the oldest ones rather than stalling the producer. A slow
//! WebSocket client is that client's problem, not the miner's.

use tokio::sync::broadcast;

use crate::block::Block;
use crate::config::EVENT_BUFFER;
use crate::transaction::Envelope;

/// Publisher/subscriber handle for ledger notifications.
///
/// Cloning is cheap and clones publish into the same channels.
#[derive(Debug, Clone)]
pub struct LedgerEvents {
    blocks: broadcast::Sender<Block>,
    envelopes: broadcast::Sender<Envelope>,
    repositories: broadcast::Sender<String>,
}

impl LedgerEvents {
    /// A hub with the default per-topic buffer.
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUFFER)
    }

    /// A hub with an explicit per-topic buffer, for tests that want to
    /// exercise overflow.
    pub fn with_capacity(capacity: usize) -> Self {
        let (blocks, _) = broadcast::channel(capacity);
        let (envelopes, _) = broadcast::channel(capacity);
        let (repositories, _) = broadcast::channel(capacity);
        LedgerEvents {
            blocks,
            envelopes,
            repositories,
        }
    }

    /// Announce a persisted block. A hub with no subscribers swallows the
    /// event; that is not an error.
    pub fn publish_block(&self, block: &Block) {
        let _ = self.blocks.send(block.clone());
    }

    /// Announce an envelope accepted into the pending pool.
    pub fn publish_envelope(&self, envelope: &Envelope) {
        let _ = self.envelopes.send(envelope.clone());
    }

    /// Announce that a repository record was created, activated, or removed.
    pub fn publish_repository_changed(&self, name: &str) {
        let _ = self.repositories.send(name.to_string());
    }

    /// Subscribe to persisted blocks.
    pub fn subscribe_blocks(&self) -> broadcast::Receiver<Block> {
        self.blocks.subscribe()
    }

    /// Subscribe to pooled envelopes.
    pub fn subscribe_envelopes(&self) -> broadcast::Receiver<Envelope> {
        self.envelopes.subscribe()
    }

    /// Subscribe to repository changes (by name).
    pub fn subscribe_repositories(&self) -> broadcast::Receiver<String> {
        self.repositories.subscribe()
    }
}

impl Default for LedgerEvents {
    fn default() -> Self {
        Self::new()
    }
}
