//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `listings` - Current listing state (key: listing_id)
//! - `audit` - Append-only audit trail (key: record_id || entry_id)
//!
//! Audit entry ids are UUIDv7, so the composite key orders a record's
//! trail oldest-first under a prefix scan.
//!
//! Listings embed free-form JSON payloads and are stored as JSON;
//! audit entries are fixed-schema and stored as bincode.

use crate::{
    error::{Error, Result},
    types::{AuditEntry, Listing},
    Config,
};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode,
    Options, WriteBatch, DB,
};
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_LISTINGS: &str = "listings";
const CF_AUDIT: &str = "audit";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        // Tuning from config
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_target_file_size_base(config.rocksdb.target_file_size_mb * 1024 * 1024);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_LISTINGS, Self::cf_options_listings()),
            ColumnFamilyDescriptor::new(CF_AUDIT, Self::cf_options_audit()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_listings() -> Options {
        let mut opts = Options::default();
        // State is frequently read, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_audit() -> Options {
        let mut opts = Options::default();
        // Audit entries are written once and rarely read
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    // With multi-threaded-cf enabled, handles are Arc-bound to the DB
    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Composite audit key: record_id || entry_id
    fn audit_key(record_id: Uuid, entry_id: Uuid) -> [u8; 32] {
        let mut key = [0u8; 32];
        key[..16].copy_from_slice(record_id.as_bytes());
        key[16..].copy_from_slice(entry_id.as_bytes());
        key
    }

    // Listing reads

    /// Get listing by ID, None when absent or deleted
    pub fn get_listing(&self, id: Uuid) -> Result<Option<Listing>> {
        let cf = self.cf_handle(CF_LISTINGS)?;

        match self.db.get_cf(&cf, id.as_bytes())? {
            Some(value) => {
                let listing: Listing = serde_json::from_slice(&value)?;
                Ok(Some(listing))
            }
            None => Ok(None),
        }
    }

    /// Scan all listings
    pub fn scan_listings(&self) -> Result<Vec<Listing>> {
        let cf = self.cf_handle(CF_LISTINGS)?;

        let mut listings = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let listing: Listing = serde_json::from_slice(&value)?;
            listings.push(listing);
        }

        Ok(listings)
    }

    // Audit reads

    /// Get audit trail for a record, oldest-first
    ///
    /// Returns an empty Vec for ids with no history; the trail of a
    /// deleted record is retained.
    pub fn audit_entries(&self, record_id: Uuid) -> Result<Vec<AuditEntry>> {
        let cf = self.cf_handle(CF_AUDIT)?;
        let prefix = record_id.as_bytes();

        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            let entry: AuditEntry = bincode::deserialize(&value)?;
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Most recent audit entry for a record (chain head)
    pub fn last_audit_entry(&self, record_id: Uuid) -> Result<Option<AuditEntry>> {
        Ok(self.audit_entries(record_id)?.pop())
    }

    // Mutations (atomic)

    /// Persist a created or updated listing with its audit entry
    ///
    /// Both writes go into one WriteBatch: there is never a state
    /// where the mutation is visible without its audit entry, or vice
    /// versa.
    pub fn commit_upsert(&self, listing: &Listing, entry: &AuditEntry) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_listings = self.cf_handle(CF_LISTINGS)?;
        batch.put_cf(&cf_listings, listing.id.as_bytes(), serde_json::to_vec(listing)?);

        let cf_audit = self.cf_handle(CF_AUDIT)?;
        let key = Self::audit_key(entry.record_id, entry.entry_id);
        batch.put_cf(&cf_audit, key, bincode::serialize(entry)?);

        self.db.write(batch)?;

        tracing::debug!(
            listing_id = %listing.id,
            edit_version = listing.edit_version,
            action = %entry.action,
            entry_hash = %entry.hash_hex(),
            "Mutation committed"
        );

        Ok(())
    }

    /// Remove a listing and append its DELETE audit entry
    pub fn commit_delete(&self, record_id: Uuid, entry: &AuditEntry) -> Result<()> {
        let mut batch = WriteBatch::default();

        let cf_listings = self.cf_handle(CF_LISTINGS)?;
        batch.delete_cf(&cf_listings, record_id.as_bytes());

        let cf_audit = self.cf_handle(CF_AUDIT)?;
        let key = Self::audit_key(record_id, entry.entry_id);
        batch.put_cf(&cf_audit, key, bincode::serialize(entry)?);

        self.db.write(batch)?;

        tracing::debug!(
            listing_id = %record_id,
            version_at_action = entry.version_at_action,
            entry_hash = %entry.hash_hex(),
            "Listing deleted"
        );

        Ok(())
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActorId, AuditAction, Document};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        (config, temp_dir)
    }

    fn test_listing() -> Listing {
        Listing {
            id: Uuid::now_v7(),
            payload: Document::from_value(json!({
                "name": "Grove Street Open Mic",
                "location": "Jersey City",
                "start_date": "2023-05-01",
            }))
            .unwrap(),
            edit_version: 0,
            last_editor: ActorId::new("user-1"),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn create_entry(listing: &Listing) -> AuditEntry {
        AuditEntry::new(
            listing.id,
            AuditAction::Create,
            0,
            listing.last_editor.clone(),
            [0u8; 32],
        )
    }

    #[test]
    fn test_storage_open() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert!(storage.db.cf_handle(CF_LISTINGS).is_some());
        assert!(storage.db.cf_handle(CF_AUDIT).is_some());
    }

    #[test]
    fn test_commit_and_get_listing() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let listing = test_listing();
        let entry = create_entry(&listing);

        storage.commit_upsert(&listing, &entry).unwrap();

        let retrieved = storage.get_listing(listing.id).unwrap().unwrap();
        assert_eq!(retrieved.id, listing.id);
        assert_eq!(retrieved.edit_version, 0);
        assert_eq!(retrieved.payload, listing.payload);

        assert!(storage.get_listing(Uuid::now_v7()).unwrap().is_none());
    }

    #[test]
    fn test_audit_trail_ordering() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let mut listing = test_listing();
        let e0 = create_entry(&listing);
        storage.commit_upsert(&listing, &e0).unwrap();

        listing.edit_version = 1;
        let e1 = AuditEntry::new(
            listing.id,
            AuditAction::Update,
            1,
            ActorId::new("user-2"),
            e0.entry_hash,
        );
        storage.commit_upsert(&listing, &e1).unwrap();

        let entries = storage.audit_entries(listing.id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[1].action, AuditAction::Update);
        assert_eq!(entries[0].version_at_action, 0);
        assert_eq!(entries[1].version_at_action, 1);

        let last = storage.last_audit_entry(listing.id).unwrap().unwrap();
        assert_eq!(last.entry_id, e1.entry_id);
    }

    #[test]
    fn test_audit_scan_stays_within_record() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let a = test_listing();
        let b = test_listing();
        storage.commit_upsert(&a, &create_entry(&a)).unwrap();
        storage.commit_upsert(&b, &create_entry(&b)).unwrap();

        let entries = storage.audit_entries(a.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record_id, a.id);
    }

    #[test]
    fn test_delete_removes_listing_keeps_audit() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();

        let listing = test_listing();
        let e0 = create_entry(&listing);
        storage.commit_upsert(&listing, &e0).unwrap();

        let e1 = AuditEntry::new(
            listing.id,
            AuditAction::Delete,
            1,
            ActorId::new("user-1"),
            e0.entry_hash,
        );
        storage.commit_delete(listing.id, &e1).unwrap();

        assert!(storage.get_listing(listing.id).unwrap().is_none());

        let entries = storage.audit_entries(listing.id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].action, AuditAction::Delete);
    }
}
