//! In-memory record store.
//!
//! Used when no database is configured and throughout the test suites. Each
//! `save` replaces the whole record under a write lock, which gives the same
//! per-document atomicity and last-writer-wins behaviour as the database.

use eventday_core::environment::{BoxFuture, RecordStore, StoreError};
use eventday_core::{DeletedFilter, Event, EventId, VendorId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Record store backed by a `HashMap`.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRecordStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, deleted included.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    /// Insert a record directly, bypassing the engine.
    pub async fn insert(&self, event: Event) {
        self.events.write().await.insert(event.id, event);
    }
}

impl RecordStore for InMemoryRecordStore {
    fn get(&self, id: EventId) -> BoxFuture<'_, Result<Option<Event>, StoreError>> {
        Box::pin(async move { Ok(self.events.read().await.get(&id).cloned()) })
    }

    fn find_by_vendor(
        &self,
        vendor: VendorId,
        filter: DeletedFilter,
    ) -> BoxFuture<'_, Result<Vec<Event>, StoreError>> {
        Box::pin(async move {
            let mut events: Vec<Event> = self
                .events
                .read()
                .await
                .values()
                .filter(|e| e.is_owned_by(vendor) && filter.matches(e))
                .cloned()
                .collect();
            events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(events)
        })
    }

    fn save(&self, event: Event) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.events.write().await.insert(event.id, event);
            Ok(())
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
