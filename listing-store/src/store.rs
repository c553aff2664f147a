//! Main store orchestration layer
//!
//! This module ties together storage, the writer actor, and the
//! mutation gates into a high-level API for listing management.
//!
//! # Example
//!
//! ```no_run
//! use listing_store::{ActorId, Config, Document, ListingStore};
//!
//! #[tokio::main]
//! async fn main() -> listing_store::Result<()> {
//!     let config = Config::default();
//!     let store = ListingStore::open(config).await?;
//!
//!     let payload = Document::from_value(serde_json::json!({
//!         "name": "Basement Open Mic",
//!         "start_date": "2024-03-01",
//!     }))?;
//!     let listing = store.create(payload, ActorId::new("user-1")).await?;
//!     println!("created {} at version {}", listing.id, listing.edit_version);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_writer, WriterHandle},
    metrics::Metrics,
    types::{ActorId, AuditEntry, Document, Listing},
    Config, Error, Result, Storage,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Main listing store interface
pub struct ListingStore {
    /// Writer handle for mutations
    handle: WriterHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics collector (per-store registry)
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl ListingStore {
    /// Open store with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        let handle = spawn_writer(storage.clone(), config.writer_mailbox_capacity);

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to register metrics: {}", e)))?;

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Create a new listing
    ///
    /// Accepts any actor, including an anonymous one: submissions are
    /// community-sourced. The payload must pass structural validation.
    pub async fn create(&self, payload: Document, actor: ActorId) -> Result<Listing> {
        payload.validate()?;

        let start = Instant::now();
        let listing = self.handle.create(payload, actor).await?;

        self.metrics.record_mutation("CREATE");
        self.metrics
            .record_mutation_duration(start.elapsed().as_secs_f64());

        tracing::info!(
            listing_id = %listing.id,
            editor = %listing.last_editor,
            "Listing created"
        );

        Ok(listing)
    }

    /// Get current listing state
    pub fn get(&self, id: Uuid) -> Result<Listing> {
        self.storage.get_listing(id)?.ok_or(Error::NotFound(id))
    }

    /// List non-deleted listings matching a caller-supplied predicate
    ///
    /// Results are ordered ascending by the payload sort key, with
    /// listings lacking one last, ties broken by id. Each call is a
    /// fresh scan of committed state.
    pub fn list<F>(&self, mut filter: F) -> Result<Vec<Listing>>
    where
        F: FnMut(&Listing) -> bool,
    {
        let mut listings: Vec<Listing> = self
            .storage
            .scan_listings()?
            .into_iter()
            .filter(|l| filter(l))
            .collect();

        listings.sort_by(|a, b| {
            match (a.payload.sort_key(), b.payload.sort_key()) {
                (Some(x), Some(y)) => x.cmp(y).then(a.id.cmp(&b.id)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.id.cmp(&b.id),
            }
        });

        Ok(listings)
    }

    /// Replace a listing's payload
    ///
    /// `expected_version` must match the stored version exactly; the
    /// new version is always computed as `expected_version + 1`. The
    /// check and the write are one atomic unit in the writer.
    pub async fn update(
        &self,
        id: Uuid,
        expected_version: u64,
        payload: Document,
        actor: ActorId,
    ) -> Result<Listing> {
        if actor.is_empty() {
            self.metrics.record_unauthorized();
            return Err(Error::Unauthorized(
                "update requires an actor identity".to_string(),
            ));
        }
        payload.validate()?;

        let start = Instant::now();
        let result = self.handle.update(id, expected_version, payload, actor).await;

        match &result {
            Ok(listing) => {
                self.metrics.record_mutation("UPDATE");
                self.metrics
                    .record_mutation_duration(start.elapsed().as_secs_f64());

                tracing::info!(
                    listing_id = %id,
                    edit_version = listing.edit_version,
                    editor = %listing.last_editor,
                    "Listing updated"
                );
            }
            Err(Error::VersionConflict { .. }) => self.metrics.record_conflict(),
            Err(_) => {}
        }

        result
    }

    /// Remove a listing from the readable store
    ///
    /// The audit trail is retained and terminated by a DELETE entry.
    pub async fn delete(&self, id: Uuid, actor: ActorId) -> Result<()> {
        if actor.is_empty() {
            self.metrics.record_unauthorized();
            return Err(Error::Unauthorized(
                "delete requires an actor identity".to_string(),
            ));
        }

        let start = Instant::now();
        self.handle.delete(id, actor).await?;

        self.metrics.record_mutation("DELETE");
        self.metrics
            .record_mutation_duration(start.elapsed().as_secs_f64());

        tracing::info!(listing_id = %id, "Listing deleted");

        Ok(())
    }

    /// Audit trail for a listing, oldest-first
    ///
    /// Returns the full retained history even after deletion; an id
    /// with no history yields an empty Vec.
    pub fn audit(&self, id: Uuid) -> Result<Vec<AuditEntry>> {
        self.storage.audit_entries(id)
    }

    /// Verify the integrity of a listing's audit chain
    pub fn verify_audit_chain(&self, id: Uuid) -> Result<()> {
        verify_chain(&self.storage.audit_entries(id)?)
    }

    /// Metrics for this store
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration this store was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shutdown store
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}

/// Date-range predicate over the payload sort key
///
/// Bounds are inclusive ISO date strings, matching the calendar
/// `?start=&end=` query. Listings without a sort key are excluded
/// once any bound is set.
pub fn date_range(
    from: Option<String>,
    to: Option<String>,
) -> impl Fn(&Listing) -> bool {
    move |listing| {
        if from.is_none() && to.is_none() {
            return true;
        }
        let Some(key) = listing.payload.sort_key() else {
            return false;
        };
        if let Some(ref from) = from {
            if key < from.as_str() {
                return false;
            }
        }
        if let Some(ref to) = to {
            if key > to.as_str() {
                return false;
            }
        }
        true
    }
}

/// Verify an audit trail: hashes, chain links, and version sequence
///
/// Entries must arrive oldest-first. An honest trail has a gap-free
/// `version_at_action` sequence 0,1,2,… and each entry commits to its
/// predecessor's hash.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<()> {
    let mut prev_hash = [0u8; 32];

    for (i, entry) in entries.iter().enumerate() {
        if !entry.verify_hash() {
            return Err(Error::AuditIntegrity(format!(
                "entry {} hash mismatch",
                i
            )));
        }
        if entry.prev_hash != prev_hash {
            return Err(Error::AuditIntegrity(format!(
                "chain broken at entry {}",
                i
            )));
        }
        if entry.version_at_action != i as u64 {
            return Err(Error::AuditIntegrity(format!(
                "version sequence broken at entry {}: expected {}, found {}",
                i, i, entry.version_at_action
            )));
        }
        prev_hash = entry.entry_hash;
    }

    Ok(())
}
