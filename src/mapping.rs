//! Declaring decoded response types as persistable.
//!
//! A response type opts into persistence by implementing [`EntityMapping`].
//! Every mapping (and every `Vec` of mappings) is [`Synchronize`], which is
//! what [`RequestBuilder::send_synced`](crate::RequestBuilder::send_synced)
//! requires of its target type.
//!
//! # Examples
//!
//! ```
//! use laze::store::{Context, IdentityAttribute, MemoryStore, Record, StoreError};
//! use laze::{Entity, EntityMapping, Synchronize};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     const NAME: &'static str = "User";
//!
//!     fn from_record(record: &Record) -> Result<Self, StoreError> {
//!         record.decode()
//!     }
//! }
//!
//! #[derive(Deserialize)]
//! struct UserDto {
//!     id: u64,
//!     name: String,
//! }
//!
//! impl EntityMapping for UserDto {
//!     type Entity = User;
//!
//!     fn id_attributes(&self) -> Option<Vec<IdentityAttribute>> {
//!         Some(vec![IdentityAttribute::new("id", self.id)])
//!     }
//!
//!     fn fill_record(&self, record: &mut Record) {
//!         record.set("id", self.id);
//!         record.set("name", self.name.clone());
//!     }
//! }
//!
//! let store = Arc::new(MemoryStore::new());
//! let context = Context::new(store.clone());
//! let dto = UserDto { id: 1, name: "Ann".into() };
//!
//! dto.synchronize(&context).unwrap();
//! context.commit();
//!
//! let user = dto.materialize(&context).unwrap().unwrap();
//! assert_eq!(user.name, "Ann");
//! assert_eq!(store.count("User"), 1);
//! ```

use crate::store::{Context, IdentityAttribute, Record, StoreError};

/// A local domain type backed by records of one entity type.
pub trait Entity: Sized {
    /// Entity type name used in the store.
    const NAME: &'static str;

    /// Builds the domain value from a stored record.
    fn from_record(record: &Record) -> Result<Self, StoreError>;
}

/// A decoded type that knows how to upsert itself into the local store.
pub trait EntityMapping {
    /// The domain type records of this mapping materialize into.
    type Entity: Entity;

    /// Attributes that identify the record to update.
    ///
    /// `None` or an empty list means the value has no stable identity;
    /// [`fallback_lookup`](EntityMapping::fallback_lookup) is consulted
    /// instead.
    fn id_attributes(&self) -> Option<Vec<IdentityAttribute>>;

    /// Copies this value's fields onto `record`.
    fn fill_record(&self, record: &mut Record);

    /// Lookup used when there are no identity attributes.
    ///
    /// The default finds nothing, so every sync inserts a new record.
    fn fallback_lookup(&self, _context: &Context) -> Result<Option<Record>, StoreError> {
        Ok(None)
    }

    /// Finds the record this value corresponds to.
    fn lookup(&self, context: &Context) -> Result<Option<Record>, StoreError> {
        match self.id_attributes() {
            Some(attributes) if !attributes.is_empty() => {
                context.find_one(Self::Entity::NAME, &attributes)
            }
            _ => self.fallback_lookup(context),
        }
    }

    /// Finds or creates the record and fills it, staging the result in
    /// `context`.
    fn map(&self, context: &Context) -> Result<Record, StoreError> {
        let (mut record, created) = match self.lookup(context)? {
            Some(record) => (record, false),
            None => (context.create(Self::Entity::NAME)?, true),
        };

        let before = record.clone();
        self.fill_record(&mut record);
        if created || record != before {
            context.stage(record.clone());
        }
        Ok(record)
    }

    /// Re-fetches the record for this value and converts it to its domain
    /// type.
    fn materialize(&self, context: &Context) -> Result<Option<Self::Entity>, StoreError> {
        self.lookup(context)?
            .as_ref()
            .map(Self::Entity::from_record)
            .transpose()
    }
}

/// Materializes the records for a sequence of mappings, skipping misses.
pub fn materialize_all<M: EntityMapping>(
    items: &[M],
    context: &Context,
) -> Result<Vec<M::Entity>, StoreError> {
    let mut entities = Vec::with_capacity(items.len());
    for item in items {
        if let Some(entity) = item.materialize(context)? {
            entities.push(entity);
        }
    }
    Ok(entities)
}

/// Decoded values that can be written into a unit of work.
pub trait Synchronize {
    /// Upserts `self` into `context` without committing.
    fn synchronize(&self, context: &Context) -> Result<(), StoreError>;
}

impl<M: EntityMapping> Synchronize for M {
    fn synchronize(&self, context: &Context) -> Result<(), StoreError> {
        self.map(context).map(|_| ())
    }
}

/// Every element is upserted even when an earlier one fails; the first
/// failure is returned.
impl<M: EntityMapping> Synchronize for Vec<M> {
    fn synchronize(&self, context: &Context) -> Result<(), StoreError> {
        let mut first_error = None;
        for item in self {
            if let Err(e) = item.map(context) {
                tracing::warn!(error = %e, entity = M::Entity::NAME, "Failed to sync element");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
