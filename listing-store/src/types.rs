//! Core types for the listing store
//!
//! All types are designed for:
//! - Schema-flexible payloads (JSON documents, opaque to the store)
//! - Tamper-evident audit history (SHA-256 hash chain)
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Payload field that identifies a listing
pub const FIELD_NAME: &str = "name";

/// Payload field used as the sort key for `list` ordering
pub const FIELD_START_DATE: &str = "start_date";

/// Authenticated identity attributed to a mutation
///
/// Always passed explicitly per call; the store holds no ambient
/// actor state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Create new actor ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Anonymous actor (accepted for create only)
    pub fn anonymous() -> Self {
        Self(String::new())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no identity has been established
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Schema-flexible listing payload
///
/// A JSON object of named fields. Field content is owned by the
/// caller; the store enforces only structural invariants (see
/// [`Document::validate`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(serde_json::Map<String, Value>);

impl Document {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; fails unless it is an object
    pub fn from_value(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(crate::Error::Validation(format!(
                "payload must be a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Get a field value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Set a field value
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Underlying field map
    pub fn fields(&self) -> &serde_json::Map<String, Value> {
        &self.0
    }

    /// Sort key for `list` ordering, when declared by the payload
    pub fn sort_key(&self) -> Option<&str> {
        self.0.get(FIELD_START_DATE).and_then(Value::as_str)
    }

    /// Enforce structural invariants
    ///
    /// Requires a non-empty string `name` field; `start_date`, when
    /// present, must be a string since it drives ordering. Everything
    /// else is opaque to the store.
    pub fn validate(&self) -> crate::Result<()> {
        match self.0.get(FIELD_NAME) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => {
                return Err(crate::Error::Validation(format!(
                    "required field '{}' is empty",
                    FIELD_NAME
                )))
            }
            Some(other) => {
                return Err(crate::Error::Validation(format!(
                    "required field '{}' must be a string, got {}",
                    FIELD_NAME,
                    json_type_name(other)
                )))
            }
            None => {
                return Err(crate::Error::Validation(format!(
                    "required field '{}' is missing",
                    FIELD_NAME
                )))
            }
        }

        if let Some(value) = self.0.get(FIELD_START_DATE) {
            if !value.is_string() {
                return Err(crate::Error::Validation(format!(
                    "field '{}' must be a string, got {}",
                    FIELD_START_DATE,
                    json_type_name(value)
                )));
            }
        }

        Ok(())
    }
}

impl From<serde_json::Map<String, Value>> for Document {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A stored listing (one open mic event series)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    /// Unique listing ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Schema-flexible payload
    pub payload: Document,

    /// Edit version: 0 at creation, +1 per successful update
    ///
    /// The sole correctness token for concurrency control.
    pub edit_version: u64,

    /// Actor who performed the most recent mutation
    pub last_editor: ActorId,

    /// Created timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

/// Mutation recorded by an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// Listing created
    Create,
    /// Listing payload replaced
    Update,
    /// Listing removed from the readable store
    Delete,
}

impl AuditAction {
    /// Stable name (hashed into the audit chain)
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one successful mutation
///
/// Entries for a record form a SHA-256 hash chain: each entry commits
/// to its predecessor via `prev_hash`, so any rewrite of history is
/// detectable. The chain outlives the listing itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID (UUIDv7, monotonically orderable)
    pub entry_id: Uuid,

    /// Listing this entry belongs to (weak reference)
    pub record_id: Uuid,

    /// Mutation that produced this entry
    pub action: AuditAction,

    /// Listing version immediately after the action
    pub version_at_action: u64,

    /// Actor who performed the mutation
    pub actor: ActorId,

    /// Entry timestamp (ordering/display only)
    pub occurred_at: DateTime<Utc>,

    /// Hash of the previous entry in this record's chain
    ///
    /// All zeroes for the CREATE entry.
    pub prev_hash: [u8; 32],

    /// Hash of this entry's contents
    pub entry_hash: [u8; 32],
}

impl AuditEntry {
    /// Build a new chained entry
    pub fn new(
        record_id: Uuid,
        action: AuditAction,
        version_at_action: u64,
        actor: ActorId,
        prev_hash: [u8; 32],
    ) -> Self {
        let mut entry = Self {
            entry_id: Uuid::now_v7(),
            record_id,
            action,
            version_at_action,
            actor,
            occurred_at: Utc::now(),
            prev_hash,
            entry_hash: [0u8; 32],
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Compute this entry's hash
    ///
    /// Covers every field except `entry_hash` itself.
    pub fn compute_hash(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.entry_id.as_bytes());
        hasher.update(self.record_id.as_bytes());
        hasher.update(self.action.as_str().as_bytes());
        hasher.update(self.version_at_action.to_be_bytes());
        hasher.update(self.actor.as_str().as_bytes());
        hasher.update(self.occurred_at.to_rfc3339().as_bytes());
        hasher.update(self.prev_hash);
        hasher.finalize().into()
    }

    /// Verify the stored hash against the entry's contents
    pub fn verify_hash(&self) -> bool {
        self.entry_hash == self.compute_hash()
    }

    /// Entry hash as hex (for logs and display)
    pub fn hash_hex(&self) -> String {
        hex::encode(self.entry_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    #[test]
    fn test_actor_id_empty() {
        assert!(ActorId::anonymous().is_empty());
        assert!(ActorId::new("   ").is_empty());
        assert!(!ActorId::new("user-1").is_empty());
    }

    #[test]
    fn test_document_requires_object() {
        assert!(Document::from_value(json!(["not", "an", "object"])).is_err());
        assert!(Document::from_value(json!({"name": "Test"})).is_ok());
    }

    #[test]
    fn test_document_validate_name() {
        assert!(doc(json!({"name": "Comedy Cellar Open Mic"})).validate().is_ok());
        assert!(doc(json!({"location": "Brooklyn"})).validate().is_err());
        assert!(doc(json!({"name": ""})).validate().is_err());
        assert!(doc(json!({"name": 42})).validate().is_err());
    }

    #[test]
    fn test_document_validate_start_date_type() {
        assert!(doc(json!({"name": "Mic", "start_date": "2023-01-01"}))
            .validate()
            .is_ok());
        assert!(doc(json!({"name": "Mic", "start_date": 20230101}))
            .validate()
            .is_err());
    }

    #[test]
    fn test_document_sort_key() {
        let d = doc(json!({"name": "Mic", "start_date": "2023-06-15"}));
        assert_eq!(d.sort_key(), Some("2023-06-15"));
        assert_eq!(doc(json!({"name": "Mic"})).sort_key(), None);
    }

    #[test]
    fn test_audit_entry_hash_roundtrip() {
        let entry = AuditEntry::new(
            Uuid::now_v7(),
            AuditAction::Create,
            0,
            ActorId::new("user-1"),
            [0u8; 32],
        );
        assert!(entry.verify_hash());
        assert_eq!(entry.hash_hex(), hex::encode(entry.entry_hash));
        assert_eq!(entry.hash_hex().len(), 64);
    }

    #[test]
    fn test_audit_entry_detects_tampering() {
        let mut entry = AuditEntry::new(
            Uuid::now_v7(),
            AuditAction::Update,
            3,
            ActorId::new("user-1"),
            [7u8; 32],
        );
        assert!(entry.verify_hash());

        entry.version_at_action = 4;
        assert!(!entry.verify_hash());
    }

    #[test]
    fn test_audit_entry_bincode_roundtrip() {
        let entry = AuditEntry::new(
            Uuid::now_v7(),
            AuditAction::Delete,
            2,
            ActorId::new("user-1"),
            [1u8; 32],
        );

        let bytes = bincode::serialize(&entry).unwrap();
        let decoded: AuditEntry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.entry_id, entry.entry_id);
        assert_eq!(decoded.entry_hash, entry.entry_hash);
        assert!(decoded.verify_hash());
    }
}
