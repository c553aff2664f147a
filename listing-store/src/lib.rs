//! OpenMic Board Listing Store
//!
//! Versioned record store with a tamper-evident audit trail, backing
//! the community open-mic directory.
//!
//! # Architecture
//!
//! - **Optimistic Concurrency**: every update carries the version the
//!   caller believes is current; stale writes fail, nothing blocks
//! - **Single Writer**: one logical writer task serializes mutations,
//!   making the version check and the commit one atomic unit
//! - **Audit Chain**: one SHA-256-chained entry per mutation, retained
//!   after the listing itself is deleted
//! - **Explicit Actors**: privileged mutations require an actor
//!   identity passed per call, never ambient state
//!
//! # Invariants
//!
//! - `edit_version` is strictly increasing per listing, never skips
//! - Exactly one audit entry per successful mutation, committed in the
//!   same WriteBatch as the mutation
//! - Audit entries are never updated or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use metrics::Metrics;
pub use storage::Storage;
pub use store::{date_range, verify_chain, ListingStore};
pub use types::{ActorId, AuditAction, AuditEntry, Document, Listing};
