//! Single-writer concurrency for the listing store
//!
//! All mutations flow through one writer task: the version check, the
//! audit-chain extension, and the WriteBatch commit happen inside a
//! single message handler, so no other writer can interleave between
//! the check and the write. Concurrent updates that share an
//! `expected_version` are serialized here and exactly one wins; the
//! loser observes a deterministic `VersionConflict`.
//!
//! Reads never pass through the mailbox; they hit storage directly
//! and see committed state only.

use crate::types::{ActorId, AuditAction, AuditEntry, Document, Listing};
use crate::{Error, Result, Storage};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the writer actor
pub enum WriterMessage {
    /// Create a new listing
    Create {
        /// Validated payload
        payload: Document,
        /// Submitting actor (may be anonymous)
        actor: ActorId,
        /// Reply channel
        response: oneshot::Sender<Result<Listing>>,
    },

    /// Replace a listing's payload, gated on `expected_version`
    Update {
        /// Listing to update
        id: Uuid,
        /// Version the caller believes is current
        expected_version: u64,
        /// Validated replacement payload
        payload: Document,
        /// Authenticated actor
        actor: ActorId,
        /// Reply channel
        response: oneshot::Sender<Result<Listing>>,
    },

    /// Remove a listing from the readable store
    Delete {
        /// Listing to delete
        id: Uuid,
        /// Authenticated actor
        actor: ActorId,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that serializes all mutations
pub struct WriterActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<WriterMessage>,
}

impl WriterActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<WriterMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                WriterMessage::Shutdown => break,
                WriterMessage::Create {
                    payload,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.handle_create(payload, actor));
                }
                WriterMessage::Update {
                    id,
                    expected_version,
                    payload,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.handle_update(id, expected_version, payload, actor));
                }
                WriterMessage::Delete {
                    id,
                    actor,
                    response,
                } => {
                    let _ = response.send(self.handle_delete(id, actor));
                }
            }
        }
    }

    fn handle_create(&self, payload: Document, actor: ActorId) -> Result<Listing> {
        let now = Utc::now();
        let listing = Listing {
            id: Uuid::now_v7(),
            payload,
            edit_version: 0,
            last_editor: actor.clone(),
            created_at: now,
            updated_at: now,
        };

        let entry = AuditEntry::new(listing.id, AuditAction::Create, 0, actor, [0u8; 32]);
        self.storage.commit_upsert(&listing, &entry)?;

        Ok(listing)
    }

    fn handle_update(
        &self,
        id: Uuid,
        expected_version: u64,
        payload: Document,
        actor: ActorId,
    ) -> Result<Listing> {
        // Defense in depth: the facade rejects empty actors before the
        // mailbox, but the storage boundary enforces it regardless.
        if actor.is_empty() {
            return Err(Error::Unauthorized(
                "update requires an actor identity".to_string(),
            ));
        }

        let stored = self
            .storage
            .get_listing(id)?
            .ok_or(Error::NotFound(id))?;

        if stored.edit_version != expected_version {
            tracing::debug!(
                listing_id = %id,
                expected = expected_version,
                found = stored.edit_version,
                "Stale update rejected"
            );
            return Err(Error::VersionConflict {
                expected: expected_version,
                found: stored.edit_version,
            });
        }

        let new_version = expected_version + 1;
        let listing = Listing {
            id,
            payload,
            edit_version: new_version,
            last_editor: actor.clone(),
            created_at: stored.created_at,
            updated_at: Utc::now(),
        };

        let prev_hash = self.chain_head(id)?;
        let entry = AuditEntry::new(id, AuditAction::Update, new_version, actor, prev_hash);
        self.storage.commit_upsert(&listing, &entry)?;

        Ok(listing)
    }

    fn handle_delete(&self, id: Uuid, actor: ActorId) -> Result<()> {
        if actor.is_empty() {
            return Err(Error::Unauthorized(
                "delete requires an actor identity".to_string(),
            ));
        }

        let stored = self
            .storage
            .get_listing(id)?
            .ok_or(Error::NotFound(id))?;

        let prev_hash = self.chain_head(id)?;
        let entry = AuditEntry::new(
            id,
            AuditAction::Delete,
            stored.edit_version + 1,
            actor,
            prev_hash,
        );
        self.storage.commit_delete(id, &entry)?;

        Ok(())
    }

    /// Hash of the most recent audit entry for `id`
    fn chain_head(&self, id: Uuid) -> Result<[u8; 32]> {
        Ok(self
            .storage
            .last_audit_entry(id)?
            .map(|e| e.entry_hash)
            .unwrap_or([0u8; 32]))
    }
}

/// Handle for sending messages to the writer
#[derive(Clone)]
pub struct WriterHandle {
    sender: mpsc::Sender<WriterMessage>,
}

impl WriterHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<WriterMessage>) -> Self {
        Self { sender }
    }

    /// Create a listing
    pub async fn create(&self, payload: Document, actor: ActorId) -> Result<Listing> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Create {
                payload,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Update a listing
    pub async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        payload: Document,
        actor: ActorId,
    ) -> Result<Listing> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Update {
                id,
                expected_version,
                payload,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Delete a listing
    pub async fn delete(&self, id: Uuid, actor: ActorId) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(WriterMessage::Delete {
                id,
                actor,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(WriterMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Writer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the writer actor
pub fn spawn_writer(storage: Arc<Storage>, mailbox_capacity: usize) -> WriterHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = WriterActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    WriterHandle::new(tx)
}
