use crate::error::Result;
use crate::repository::{MemoryStore, StoredMemory};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Last known listing of stored memories.
///
/// A failed refresh leaves the previous listing in place: stale data is
/// preferred over an empty screen.
pub struct MemoryFeed {
    store: Arc<dyn MemoryStore>,
    memories: Vec<StoredMemory>,
    loading: watch::Sender<bool>,
}

impl MemoryFeed {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            memories: Vec::new(),
            loading: watch::channel(false).0,
        }
    }

    /// Fetch the listing again, newest first.
    pub async fn refresh(&mut self) -> Result<&[StoredMemory]> {
        self.loading.send_replace(true);
        let fetched = self.store.fetch_memories().await;
        self.loading.send_replace(false);

        match fetched {
            Ok(memories) => {
                info!(count = memories.len(), "Memory feed refreshed");
                self.memories = memories;
                Ok(&self.memories)
            }
            Err(err) => {
                warn!(error = %err, kept = self.memories.len(), "Memory feed refresh failed");
                Err(err)
            }
        }
    }

    pub fn memories(&self) -> &[StoredMemory] {
        &self.memories
    }

    pub fn is_loading(&self) -> bool {
        *self.loading.borrow()
    }

    /// Watch the loading flag while a refresh is running
    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.loading.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::repository::MockMemoryStore;
    use chrono::{TimeZone, Utc};

    fn memory(id: &str, day: u32) -> StoredMemory {
        StoredMemory {
            id: id.to_string(),
            title: format!("Memory {id}"),
            description: None,
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_listing() {
        let mut store = MockMemoryStore::new();
        store
            .expect_fetch_memories()
            .times(1)
            .returning(|| Ok(vec![memory("2", 2), memory("1", 1)]));

        let mut feed = MemoryFeed::new(Arc::new(store));
        assert!(feed.memories().is_empty());

        let listed = feed.refresh().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(feed.memories()[0].id, "2");
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_listing() {
        let mut store = MockMemoryStore::new();
        let mut calls = 0;
        store.expect_fetch_memories().times(2).returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(vec![memory("1", 1)])
            } else {
                Err(Error::Fetch("connection refused".to_string()))
            }
        });

        let mut feed = MemoryFeed::new(Arc::new(store));
        feed.refresh().await.unwrap();

        let err = feed.refresh().await.unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
        assert_eq!(feed.memories().len(), 1);
        assert_eq!(feed.memories()[0].id, "1");
        assert!(!feed.is_loading());
    }

    /// Store that parks until released
    struct GatedStore {
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl MemoryStore for GatedStore {
        async fn create_memory_row(
            &self,
            _row: crate::repository::NewMemoryRow,
        ) -> Result<StoredMemory> {
            unreachable!("feed never inserts")
        }

        async fn fetch_memories(&self) -> Result<Vec<StoredMemory>> {
            self.release.notified().await;
            Ok(vec![memory("1", 1)])
        }
    }

    #[tokio::test]
    async fn test_loading_visible_during_refresh() {
        let store = Arc::new(GatedStore {
            release: tokio::sync::Notify::new(),
        });
        let mut feed = MemoryFeed::new(store.clone());
        let mut loading = feed.subscribe_loading();
        assert!(!*loading.borrow());

        let observer = async {
            loading.wait_for(|l| *l).await.unwrap();
            store.release.notify_one();
        };
        let (listed, ()) = tokio::join!(feed.refresh(), observer);

        assert_eq!(listed.unwrap().len(), 1);
        assert!(!feed.is_loading());
    }
}
