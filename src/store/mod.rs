//! Local object store: records, lookup predicates and units of work.
//!
//! The pipeline never talks to a storage engine directly. It goes through a
//! [`Context`] (a unit of work), whose root sits on top of a [`Store`]
//! implementation. [`MemoryStore`] is the implementation shipped with the
//! crate; anything that can fetch by equality predicate, allocate record ids
//! and write a batch of records can stand in for it.

mod context;

pub use context::Context;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// Field storage of a [`Record`].
pub type Fields = Map<String, Value>;

/// Identifier of a record, unique within one [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    /// Returns the raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object in the local store.
///
/// A record is addressed by its entity name and carries a JSON field map.
/// Records are plain values: changing one does nothing until it is staged
/// into a [`Context`] and committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    entity: String,
    fields: Fields,
}

impl Record {
    pub(crate) fn new(id: RecordId, entity: impl Into<String>) -> Self {
        Self {
            id,
            entity: entity.into(),
            fields: Fields::new(),
        }
    }

    /// The record id.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// The entity type name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// All fields of the record.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Returns a single field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Sets a field value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Removes a field.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Deserializes the field map into `T`.
    ///
    /// This is the usual way to implement [`Entity::from_record`](crate::Entity::from_record).
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Conversion {
                entity: self.entity.clone(),
                id: self.id,
                message: e.to_string(),
            }
        })
    }

    /// Returns `true` if every attribute equals the corresponding field.
    pub fn matches(&self, attributes: &[IdentityAttribute]) -> bool {
        attributes
            .iter()
            .all(|attr| self.fields.get(&attr.key) == Some(&attr.value))
    }
}

/// A `(field, value)` pair used to locate an existing record.
///
/// A set of attributes forms an AND-combined equality predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityAttribute {
    /// Field name.
    pub key: String,
    /// Expected value.
    pub value: Value,
}

impl IdentityAttribute {
    /// Creates a new attribute.
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A lookup of records of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Entity type name.
    pub entity: String,
    /// Equality predicate; empty matches every record of the entity.
    pub predicate: Vec<IdentityAttribute>,
    /// Maximum number of records returned.
    pub limit: Option<usize>,
}

impl FetchRequest {
    /// Creates a request matching every record of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            predicate: Vec::new(),
            limit: None,
        }
    }

    /// Restricts the request to records matching all `attributes`.
    pub fn matching(mut self, attributes: impl IntoIterator<Item = IdentityAttribute>) -> Self {
        self.predicate.extend(attributes);
        self
    }

    /// Limits the number of records returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `record` satisfies the entity and predicate.
    pub fn accepts(&self, record: &Record) -> bool {
        record.entity == self.entity && record.matches(&self.predicate)
    }
}

/// Errors raised by the local store.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The store does not know the entity type.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// A record could not be converted into its domain type.
    #[error("Failed to convert {entity} record {id}: {message}")]
    Conversion {
        /// Entity type name
        entity: String,
        /// The offending record
        id: RecordId,
        /// Conversion error message
        message: String,
    },

    /// The store refused to persist a batch of records.
    #[error("Store write failed: {0}")]
    WriteFailed(String),
}

/// Backing object store.
///
/// Implementations must be safe to share between threads; units of work
/// call into them from whatever worker the pipeline runs on.
pub trait Store: Send + Sync {
    /// Returns the records accepted by `request`, ordered by id, honoring
    /// its limit.
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>, StoreError>;

    /// Reserves a fresh id for a new record of `entity`.
    fn allocate(&self, entity: &str) -> Result<RecordId, StoreError>;

    /// Persists a batch of records, inserting or replacing by id.
    fn write(&self, records: Vec<Record>) -> Result<(), StoreError>;
}

/// An ordered, in-memory [`Store`].
///
/// # Examples
///
/// ```
/// use laze::store::{Context, FetchRequest, MemoryStore};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// let context = Context::new(store.clone());
///
/// let mut user = context.create("User").unwrap();
/// user.set("id", 7);
/// context.stage(user);
/// context.commit();
///
/// assert_eq!(store.count("User"), 1);
/// assert_eq!(store.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<RecordId, Record>>,
    entities: Option<HashSet<String>>,
    next_id: AtomicU64,
    writes: AtomicUsize,
    read_only: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store accepting any entity name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that only knows the given entity names.
    pub fn with_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: Some(entities.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Makes subsequent writes fail (or succeed again).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    /// Number of batches written to the store so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored records of `entity`.
    pub fn count(&self, entity: &str) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|r| r.entity == entity)
            .count()
    }

    /// Total number of stored records.
    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_entity(&self, entity: &str) -> Result<(), StoreError> {
        match &self.entities {
            Some(known) if !known.contains(entity) => {
                Err(StoreError::UnknownEntity(entity.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Store for MemoryStore {
    fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        self.check_entity(&request.entity)?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let matching = records.values().filter(|r| request.accepts(r)).cloned();
        Ok(match request.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    fn allocate(&self, entity: &str) -> Result<RecordId, StoreError> {
        self.check_entity(entity)?;
        Ok(RecordId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn write(&self, batch: Vec<Record>) -> Result<(), StoreError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailed("store is read-only".to_string()));
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        for record in batch {
            records.insert(record.id, record);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn record(id: u64, entity: &str, fields: Value) -> Record {
        let mut record = Record::new(RecordId(id), entity);
        if let Value::Object(map) = fields {
            record.fields = map;
        }
        record
    }

    #[test]
    fn test_fetch_applies_predicate_and_limit() {
        let store = MemoryStore::new();
        store
            .write(vec![
                record(1, "User", json!({"team": "a", "name": "x"})),
                record(2, "User", json!({"team": "a", "name": "y"})),
                record(3, "User", json!({"team": "b", "name": "x"})),
                record(4, "Team", json!({"team": "a"})),
            ])
            .unwrap();

        let request = FetchRequest::new("User").matching([IdentityAttribute::new("team", "a")]);
        let found = store.fetch(&request).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), RecordId(1));

        let found = store.fetch(&request.clone().limit(1)).unwrap();
        assert_eq!(found.len(), 1);

        let request = FetchRequest::new("User").matching([
            IdentityAttribute::new("team", "b"),
            IdentityAttribute::new("name", "x"),
        ]);
        let found = store.fetch(&request).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), RecordId(3));
    }

    #[test]
    fn test_unknown_entity() {
        let store = MemoryStore::with_entities(["User"]);
        assert!(store.allocate("User").is_ok());
        assert_eq!(
            store.allocate("Post"),
            Err(StoreError::UnknownEntity("Post".to_string()))
        );
        assert!(store.fetch(&FetchRequest::new("Post")).is_err());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        let result = store.write(vec![record(1, "User", json!({}))]);
        assert!(matches!(result, Err(StoreError::WriteFailed(_))));
        assert!(store.is_empty());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_record_decode() {
        #[derive(Debug, Deserialize)]
        struct User {
            id: u32,
            name: String,
        }

        let user: User = record(1, "User", json!({"id": 3, "name": "Ann"}))
            .decode()
            .unwrap();
        assert_eq!(user.id, 3);
        assert_eq!(user.name, "Ann");

        let err = record(1, "User", json!({"id": "three"}))
            .decode::<User>()
            .unwrap_err();
        assert!(matches!(err, StoreError::Conversion { .. }));
    }
}
