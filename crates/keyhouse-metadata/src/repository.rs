//! Metadata Repository - Read-Only Snapshot Access and Change Events
//!
//! Consumers of store metadata (routers, storage nodes) do not talk to the
//! cluster coordinator directly. They read a locally cached snapshot through
//! [`MetadataRepository`] and react to [`StoreDataChangedListener`] callbacks
//! when a store is created, changed, or deleted.
//!
//! [`InMemoryMetadataRepository`] is the snapshot-backed implementation
//! bundled with this crate. Embedding processes mutate it with
//! [`InMemoryMetadataRepository::put_store`] and
//! [`InMemoryMetadataRepository::delete_store`], which fire the registered
//! listeners synchronously on the mutating thread. Listeners must therefore
//! be fast and internally synchronized.

use crate::error::Result;
use crate::types::Store;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Callbacks fired when store metadata changes.
///
/// Delivery may happen on arbitrary threads, and callbacks for different
/// stores may interleave. Implementations must not assume any cross-store
/// ordering.
pub trait StoreDataChangedListener: Send + Sync {
    fn store_created(&self, store: &Store);
    fn store_changed(&self, store: &Store);
    fn store_deleted(&self, store: &Store);
}

/// Read-only access to the cached store metadata snapshot.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Resynchronize the cached snapshot with the metadata source.
    async fn refresh(&self) -> Result<()>;

    /// All stores in the current snapshot.
    async fn all_stores(&self) -> Result<Vec<Store>>;

    /// Look up one store by name.
    async fn store(&self, name: &str) -> Result<Option<Store>>;

    /// Register a listener for store change events.
    fn register_store_data_changed_listener(&self, listener: Arc<dyn StoreDataChangedListener>);
}

/// Snapshot-backed repository holding stores in memory.
#[derive(Default)]
pub struct InMemoryMetadataRepository {
    stores: RwLock<HashMap<String, Store>>,
    listeners: RwLock<Vec<Arc<dyn StoreDataChangedListener>>>,
}

impl InMemoryMetadataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a store and notify listeners.
    ///
    /// Fires `store_created` when the store was previously unknown and
    /// `store_changed` otherwise.
    pub fn put_store(&self, store: Store) {
        let created = self
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(store.name.clone(), store.clone())
            .is_none();

        debug!(store = %store.name, created, "store metadata updated");

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            if created {
                listener.store_created(&store);
            } else {
                listener.store_changed(&store);
            }
        }
    }

    /// Remove a store and notify listeners with its last known state.
    pub fn delete_store(&self, name: &str) {
        let removed = self
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);

        if let Some(store) = removed {
            debug!(store = %store.name, "store metadata deleted");
            let listeners = self
                .listeners
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for listener in listeners {
                listener.store_deleted(&store);
            }
        }
    }
}

#[async_trait]
impl MetadataRepository for InMemoryMetadataRepository {
    async fn refresh(&self) -> Result<()> {
        // The snapshot is the source of truth here; nothing to resync.
        Ok(())
    }

    async fn all_stores(&self) -> Result<Vec<Store>> {
        Ok(self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    async fn store(&self, name: &str) -> Result<Option<Store>> {
        Ok(self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    fn register_store_data_changed_listener(&self, listener: Arc<dyn StoreDataChangedListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Version, VersionStatus};
    use keyhouse_core::CompressionStrategy;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl StoreDataChangedListener for RecordingListener {
        fn store_created(&self, store: &Store) {
            self.events
                .lock()
                .unwrap()
                .push(format!("created:{}", store.name));
        }

        fn store_changed(&self, store: &Store) {
            self.events
                .lock()
                .unwrap()
                .push(format!("changed:{}", store.name));
        }

        fn store_deleted(&self, store: &Store) {
            self.events
                .lock()
                .unwrap()
                .push(format!("deleted:{}", store.name));
        }
    }

    fn sample_store(name: &str) -> Store {
        Store::new(
            name,
            vec![Version::new(
                name,
                1,
                VersionStatus::Online,
                CompressionStrategy::NoOp,
            )],
        )
    }

    #[tokio::test]
    async fn test_put_and_lookup() {
        let repo = InMemoryMetadataRepository::new();
        repo.put_store(sample_store("orders"));

        let store = repo.store("orders").await.unwrap().unwrap();
        assert_eq!(store.name, "orders");
        assert!(repo.store("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_all_stores() {
        let repo = InMemoryMetadataRepository::new();
        repo.put_store(sample_store("a"));
        repo.put_store(sample_store("b"));

        let mut names: Vec<String> = repo
            .all_stores()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_listener_created_then_changed() {
        let repo = InMemoryMetadataRepository::new();
        let listener = Arc::new(RecordingListener::default());
        repo.register_store_data_changed_listener(listener.clone());

        repo.put_store(sample_store("orders"));
        repo.put_store(sample_store("orders"));

        let events = listener.events.lock().unwrap().clone();
        assert_eq!(events, vec!["created:orders", "changed:orders"]);
    }

    #[tokio::test]
    async fn test_listener_deleted() {
        let repo = InMemoryMetadataRepository::new();
        let listener = Arc::new(RecordingListener::default());
        repo.register_store_data_changed_listener(listener.clone());

        repo.put_store(sample_store("orders"));
        repo.delete_store("orders");
        // Deleting an unknown store fires nothing.
        repo.delete_store("orders");

        let events = listener.events.lock().unwrap().clone();
        assert_eq!(events, vec!["created:orders", "deleted:orders"]);
    }

    #[tokio::test]
    async fn test_delete_removes_from_snapshot() {
        let repo = InMemoryMetadataRepository::new();
        repo.put_store(sample_store("orders"));
        repo.delete_store("orders");

        assert!(repo.store("orders").await.unwrap().is_none());
        assert!(repo.all_stores().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_is_noop() {
        let repo = InMemoryMetadataRepository::new();
        repo.refresh().await.unwrap();
    }
}
