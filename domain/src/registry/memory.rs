use super::{Entry, Registry};
use crate::error::Error;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;
use entity_api::{connection_class::ConnectionClass, ConnectionId};
use std::collections::HashSet;

/// Process-local registry with dual indices for O(1) lookups.
///
/// Writers always lock the primary map before the class index, and readers of
/// the class index copy the id set out before touching the primary map, so the
/// two maps are never locked in opposite orders.
pub struct MemoryRegistry {
    /// Primary storage: lookup by connection id
    connections: DashMap<ConnectionId, Entry>,

    /// Secondary index: every connection id currently holding a class
    class_index: DashMap<ConnectionClass, HashSet<ConnectionId>>,

    ttl: Option<Duration>,
}

impl MemoryRegistry {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            connections: DashMap::new(),
            class_index: DashMap::new(),
            ttl,
        }
    }

    fn index(&self, id: &str, class: ConnectionClass) {
        self.class_index
            .entry(class)
            .or_default()
            .insert(id.to_string());
    }

    fn unindex(&self, id: &str, class: ConnectionClass) {
        if let Some(mut ids) = self.class_index.get_mut(&class) {
            ids.remove(id);

            // Clean up empty class entries
            if ids.is_empty() {
                drop(ids); // Release lock before removal
                self.class_index.remove_if(&class, |_, ids| ids.is_empty());
            }
        }
    }

    fn remove(&self, id: &str) -> bool {
        match self.connections.entry(id.to_string()) {
            Slot::Occupied(occupied) => {
                self.unindex(id, occupied.get().class);
                occupied.remove();
                true
            }
            Slot::Vacant(_) => false,
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn upsert(&self, id: &str, class: ConnectionClass) -> Result<Entry, Error> {
        let now = Utc::now();
        let expires_at = self.ttl.map(|ttl| (now + ttl).into());

        let entry = match self.connections.entry(id.to_string()) {
            Slot::Occupied(mut occupied) => {
                let previous = occupied.get().class;
                let entry = occupied.get_mut();
                entry.class = class;
                entry.expires_at = expires_at;

                if previous != class {
                    self.unindex(id, previous);
                    self.index(id, class);
                }
                entry.clone()
            }
            Slot::Vacant(vacant) => {
                let entry = Entry {
                    id: id.to_string(),
                    class,
                    registered_at: now.into(),
                    expires_at,
                };
                self.index(id, class);
                vacant.insert(entry.clone());
                entry
            }
        };

        Ok(entry)
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        self.remove(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Entry>, Error> {
        Ok(self.connections.get(id).map(|entry| entry.value().clone()))
    }

    async fn list_by_class(&self, class: ConnectionClass) -> Result<Vec<Entry>, Error> {
        let ids: Vec<ConnectionId> = self
            .class_index
            .get(&class)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();

        Ok(ids
            .iter()
            .filter_map(|id| self.connections.get(id).map(|entry| entry.value().clone()))
            .filter(|entry| entry.class == class)
            .collect())
    }

    async fn refresh(&self, id: &str) -> Result<(), Error> {
        if let (Some(ttl), Some(mut entry)) = (self.ttl, self.connections.get_mut(id)) {
            entry.expires_at = Some((Utc::now() + ttl).into());
        }
        Ok(())
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        let expired: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|entry| entry.expires_at.is_some_and(|expires_at| expires_at < now))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for id in expired {
            // Re-check under the entry lock; the connection may have re-identified
            if let Slot::Occupied(occupied) = self.connections.entry(id.clone()) {
                if occupied
                    .get()
                    .expires_at
                    .is_some_and(|expires_at| expires_at < now)
                {
                    self.unindex(&id, occupied.get().class);
                    occupied.remove();
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids(entries: &[Entry]) -> Vec<&str> {
        let mut ids: Vec<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[tokio::test]
    async fn upsert_makes_the_entry_visible_in_its_class_only() -> Result<(), Error> {
        let registry = MemoryRegistry::default();

        registry.upsert("x", ConnectionClass::Agent).await?;

        assert_eq!(
            registry.get("x").await?.map(|entry| entry.class),
            Some(ConnectionClass::Agent)
        );
        assert_eq!(
            ids(&registry.list_by_class(ConnectionClass::Agent).await?),
            vec!["x"]
        );
        assert!(registry
            .list_by_class(ConnectionClass::Counterpart)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_the_entry_from_every_listing() -> Result<(), Error> {
        let registry = MemoryRegistry::default();
        registry.upsert("x", ConnectionClass::Counterpart).await?;

        registry.delete("x").await?;

        assert!(registry.get("x").await?.is_none());
        assert!(registry
            .list_by_class(ConnectionClass::Agent)
            .await?
            .is_empty());
        assert!(registry
            .list_by_class(ConnectionClass::Counterpart)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_of_absent_id_is_not_an_error() -> Result<(), Error> {
        let registry = MemoryRegistry::default();

        registry.delete("never-seen").await?;
        Ok(())
    }

    #[tokio::test]
    async fn repeated_identify_leaves_a_single_entry() -> Result<(), Error> {
        let registry = MemoryRegistry::default();

        registry.upsert("x", ConnectionClass::Agent).await?;
        registry.upsert("x", ConnectionClass::Agent).await?;

        assert_eq!(
            ids(&registry.list_by_class(ConnectionClass::Agent).await?),
            vec!["x"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn reidentify_moves_the_entry_between_classes() -> Result<(), Error> {
        let registry = MemoryRegistry::default();
        let first = registry.upsert("x", ConnectionClass::Agent).await?;

        let second = registry.upsert("x", ConnectionClass::Counterpart).await?;

        assert_eq!(second.registered_at, first.registered_at);
        assert!(registry
            .list_by_class(ConnectionClass::Agent)
            .await?
            .is_empty());
        assert_eq!(
            ids(&registry.list_by_class(ConnectionClass::Counterpart).await?),
            vec!["x"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn evict_expired_only_removes_entries_past_their_expiry() -> Result<(), Error> {
        let registry = MemoryRegistry::new(Some(Duration::minutes(5)));
        registry.upsert("old", ConnectionClass::Agent).await?;
        registry.upsert("new", ConnectionClass::Agent).await?;

        // Push one entry's expiry into the past
        if let Some(mut entry) = registry.connections.get_mut("old") {
            entry.expires_at = Some((Utc::now() - Duration::minutes(1)).into());
        }

        let removed = registry.evict_expired(Utc::now()).await?;

        assert_eq!(removed, 1);
        assert_eq!(
            ids(&registry.list_by_class(ConnectionClass::Agent).await?),
            vec!["new"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn refresh_keeps_an_entry_past_its_original_expiry() -> Result<(), Error> {
        let registry = MemoryRegistry::new(Some(Duration::minutes(5)));
        registry.upsert("x", ConnectionClass::Counterpart).await?;
        if let Some(mut entry) = registry.connections.get_mut("x") {
            entry.expires_at = Some((Utc::now() - Duration::minutes(1)).into());
        }

        registry.refresh("x").await?;
        registry.refresh("never-seen").await?;

        assert_eq!(registry.evict_expired(Utc::now()).await?, 0);
        assert_eq!(
            registry.get("x").await?.map(|entry| entry.class),
            Some(ConnectionClass::Counterpart)
        );
        assert!(registry.get("never-seen").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn entries_without_ttl_never_expire() -> Result<(), Error> {
        let registry = MemoryRegistry::new(None);
        registry.upsert("x", ConnectionClass::Agent).await?;

        let removed = registry
            .evict_expired(Utc::now() + Duration::days(365))
            .await?;

        assert_eq!(removed, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn class_index_matches_entries_after_concurrent_churn() -> Result<(), Error> {
        let registry = Arc::new(MemoryRegistry::default());
        let mut tasks = Vec::new();

        for worker in 0..8 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                for round in 0..50 {
                    let id = format!("conn-{}", round % 10);
                    let class = if (worker + round) % 2 == 0 {
                        ConnectionClass::Agent
                    } else {
                        ConnectionClass::Counterpart
                    };
                    if round % 7 == worker % 7 {
                        registry.delete(&id).await.unwrap();
                    } else {
                        registry.upsert(&id, class).await.unwrap();
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        for class in [ConnectionClass::Agent, ConnectionClass::Counterpart] {
            let indexed: HashSet<ConnectionId> = registry
                .class_index
                .get(&class)
                .map(|ids| ids.value().clone())
                .unwrap_or_default();
            let actual: HashSet<ConnectionId> = registry
                .connections
                .iter()
                .filter(|entry| entry.class == class)
                .map(|entry| entry.key().clone())
                .collect();
            assert_eq!(indexed, actual, "{class} index out of sync");
        }
        Ok(())
    }
}
