//! Units of work over a [`Store`].

use super::{FetchRequest, IdentityAttribute, Record, RecordId, Store, StoreError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

enum Parent {
    Store(Arc<dyn Store>),
    Context(Arc<Context>),
}

/// A scoped unit of work.
///
/// Reads see the context's own pending records on top of its parent's view.
/// Writes are buffered until [`commit`](Context::commit) pushes them one level
/// up: into the parent context for a child, into the [`Store`] for a root.
///
/// A context guards its pending set internally, but it is still meant to be
/// used by a single writer at a time.
pub struct Context {
    parent: Parent,
    pending: Mutex<BTreeMap<RecordId, Record>>,
}

impl Context {
    /// Creates a root context writing into `store`.
    pub fn new(store: Arc<dyn Store>) -> Arc<Self> {
        Arc::new(Self {
            parent: Parent::Store(store),
            pending: Mutex::new(BTreeMap::new()),
        })
    }

    /// Creates a child context whose commits land in `self`.
    pub fn child(self: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            parent: Parent::Context(Arc::clone(self)),
            pending: Mutex::new(BTreeMap::new()),
        })
    }

    /// The parent context, or `None` for a root.
    pub fn parent(&self) -> Option<&Arc<Context>> {
        match &self.parent {
            Parent::Context(parent) => Some(parent),
            Parent::Store(_) => None,
        }
    }

    /// Returns `true` if this context holds uncommitted changes.
    pub fn has_changes(&self) -> bool {
        !self.pending().is_empty()
    }

    /// Fetches records visible from this context.
    pub fn fetch(&self, request: &FetchRequest) -> Result<Vec<Record>, StoreError> {
        let pending = self.pending().clone();
        let mut unlimited = request.clone();
        unlimited.limit = None;

        let mut visible: BTreeMap<RecordId, Record> = match &self.parent {
            Parent::Store(store) => store.fetch(&unlimited)?,
            Parent::Context(parent) => parent.fetch(&unlimited)?,
        }
        .into_iter()
        .map(|r| (r.id(), r))
        .collect();

        for (id, record) in pending {
            if request.accepts(&record) {
                visible.insert(id, record);
            } else {
                visible.remove(&id);
            }
        }

        let records = visible.into_values();
        Ok(match request.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        })
    }

    /// Finds the first record of `entity` matching all `attributes`.
    pub fn find_one(
        &self,
        entity: &str,
        attributes: &[IdentityAttribute],
    ) -> Result<Option<Record>, StoreError> {
        let request = FetchRequest::new(entity)
            .matching(attributes.iter().cloned())
            .limit(1);
        Ok(self.fetch(&request)?.into_iter().next())
    }

    /// Instantiates a new, empty record of `entity` in this context.
    pub fn create(&self, entity: &str) -> Result<Record, StoreError> {
        let id = self.store().allocate(entity)?;
        let record = Record::new(id, entity);
        self.stage(record.clone());
        Ok(record)
    }

    /// Registers a new or changed record as a pending change.
    pub fn stage(&self, record: Record) {
        self.pending().insert(record.id(), record);
    }

    /// Pushes pending changes to the parent.
    ///
    /// On failure the changes stay pending in this context.
    pub fn save(&self) -> Result<(), StoreError> {
        let batch: Vec<Record> = std::mem::take(&mut *self.pending())
            .into_values()
            .collect();
        if batch.is_empty() {
            return Ok(());
        }

        match &self.parent {
            Parent::Store(store) => {
                if let Err(e) = store.write(batch.clone()) {
                    let mut pending = self.pending();
                    for record in batch {
                        pending.entry(record.id()).or_insert(record);
                    }
                    return Err(e);
                }
            }
            Parent::Context(parent) => {
                for record in batch {
                    parent.stage(record);
                }
            }
        }
        Ok(())
    }

    /// Commits pending changes if there are any.
    ///
    /// After a successful save into a parent context, the parent is committed
    /// too when it has changes of its own, and so on up the chain. Failures
    /// are logged and otherwise ignored.
    pub fn commit(&self) {
        if !self.has_changes() {
            tracing::trace!("No pending changes to commit");
            return;
        }

        match self.save() {
            Ok(()) => {
                if let Parent::Context(parent) = &self.parent {
                    if parent.has_changes() {
                        parent.commit();
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to commit pending changes");
            }
        }
    }

    fn store(&self) -> &Arc<dyn Store> {
        match &self.parent {
            Parent::Store(store) => store,
            Parent::Context(parent) => parent.store(),
        }
    }

    fn pending(&self) -> MutexGuard<'_, BTreeMap<RecordId, Record>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.parent().is_none())
            .field("pending", &self.pending().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn user(context: &Context, id: i64) -> Record {
        let mut record = context.create("User").unwrap();
        record.set("id", id);
        context.stage(record.clone());
        record
    }

    #[test]
    fn test_commit_without_changes_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let context = Context::new(store.clone());

        assert!(!context.has_changes());
        context.commit();
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_pending_records_are_visible_before_commit() {
        let store = Arc::new(MemoryStore::new());
        let context = Context::new(store.clone());
        user(&context, 1);

        let found = context
            .find_one("User", &[IdentityAttribute::new("id", 1)])
            .unwrap();
        assert!(found.is_some());
        assert!(store.is_empty());

        context.commit();
        assert_eq!(store.count("User"), 1);
        assert!(!context.has_changes());
    }

    #[test]
    fn test_pending_update_hides_stale_match() {
        let store = Arc::new(MemoryStore::new());
        let context = Context::new(store.clone());
        let mut record = user(&context, 1);
        context.commit();

        record.set("id", 2);
        context.stage(record);

        let old = context
            .find_one("User", &[IdentityAttribute::new("id", 1)])
            .unwrap();
        assert!(old.is_none());
        let new = context
            .find_one("User", &[IdentityAttribute::new("id", 2)])
            .unwrap();
        assert!(new.is_some());
    }

    #[test]
    fn test_child_commit_propagates_to_root() {
        let store = Arc::new(MemoryStore::new());
        let root = Context::new(store.clone());
        let child = root.child();
        assert!(child.parent().is_some());

        user(&child, 1);
        assert!(root.find_one("User", &[]).unwrap().is_none());

        child.commit();
        assert!(!child.has_changes());
        assert!(!root.has_changes());
        assert_eq!(store.count("User"), 1);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_failed_commit_keeps_changes_pending() {
        let store = Arc::new(MemoryStore::new());
        store.set_read_only(true);
        let context = Context::new(store.clone());
        user(&context, 1);

        context.commit();
        assert!(context.has_changes());
        assert!(store.is_empty());

        store.set_read_only(false);
        context.commit();
        assert!(!context.has_changes());
        assert_eq!(store.count("User"), 1);
    }
}
