use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version,
    store::{EventStore, Transaction, validate_transaction},
};

/// In-memory event store.
///
/// Commits run under a single write lock, which makes every multi-stream
/// transaction atomic and serializes version checks. Cloning shares the
/// underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
    snapshots: Arc<RwLock<HashMap<AggregateId, Snapshot>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

fn current_version(events: &[EventEnvelope], aggregate_id: AggregateId) -> Version {
    events
        .iter()
        .filter(|e| e.aggregate_id == aggregate_id)
        .map(|e| e.version)
        .max()
        .unwrap_or(Version::initial())
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, transaction: Transaction) -> Result<Vec<Version>> {
        validate_transaction(&transaction)?;

        let mut store = self.events.write().await;

        // Check every stream before writing any of them.
        let mut new_versions = Vec::with_capacity(transaction.streams().len());
        for stream in transaction.streams() {
            let first = &stream.events[0];
            let aggregate_id = first.aggregate_id;
            let actual = current_version(&store, aggregate_id);

            if let Some(expected) = stream.options.expected_version
                && actual != expected
            {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected,
                    actual,
                });
            }

            // Mirrors the unique (aggregate_id, version) constraint.
            if first.version != actual.next() {
                metrics::counter!("event_store_conflicts_total").increment(1);
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id,
                    expected: stream.options.expected_version.unwrap_or(actual),
                    actual,
                });
            }

            new_versions.push(stream.last_version().unwrap_or(actual));
        }

        metrics::counter!("event_store_events_appended_total")
            .increment(transaction.event_count() as u64);
        for stream in transaction.into_streams() {
            store.extend(stream.events);
        }

        Ok(new_versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.get_events_for_aggregate_from_version(aggregate_id, Version::initial())
            .await
    }

    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id && e.version >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }

    async fn list_aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let store = self.events.read().await;
        // Insertion order is commit order, so first events are already sorted.
        Ok(store
            .iter()
            .filter(|e| e.aggregate_type == aggregate_type && e.version == Version::first())
            .map(|e| e.aggregate_id)
            .collect())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write().await;
        snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots.get(&aggregate_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AppendOptions, EventStoreExt};

    fn event(aggregate_id: AggregateId, aggregate_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(aggregate_type)
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_and_read_back() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        let version = store
            .append(
                vec![event(id, "Order", 1), event(id, "Order", 2)],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();

        assert_eq!(version, Version::new(2));
        let events = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].version, Version::new(2));
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(vec![event(id, "Product", 1)], AppendOptions::expect_new())
            .await
            .unwrap();

        let result = store
            .append(vec![event(id, "Product", 1)], AppendOptions::expect_new())
            .await;

        assert!(matches!(
            result,
            Err(EventStoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn transaction_commits_both_streams() {
        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        let product = AggregateId::new();

        let mut tx = Transaction::new();
        tx.append(vec![event(order, "Order", 1)], AppendOptions::expect_new())
            .append(vec![event(product, "Product", 1)], AppendOptions::expect_new());

        let versions = store.commit(tx).await.unwrap();
        assert_eq!(versions, vec![Version::first(), Version::first()]);
        assert_eq!(store.event_count().await, 2);
    }

    #[tokio::test]
    async fn transaction_conflict_writes_nothing() {
        let store = InMemoryEventStore::new();
        let order = AggregateId::new();
        let product = AggregateId::new();
        store
            .append(vec![event(product, "Product", 1)], AppendOptions::expect_new())
            .await
            .unwrap();

        // The product stream is at version 1, not 0.
        let mut tx = Transaction::new();
        tx.append(vec![event(order, "Order", 1)], AppendOptions::expect_new())
            .append(vec![event(product, "Product", 1)], AppendOptions::expect_new());

        let result = store.commit(tx).await;
        assert!(result.unwrap_err().is_conflict());
        assert!(store.get_events_for_aggregate(order).await.unwrap().is_empty());
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn events_from_version() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(
                vec![
                    event(id, "Product", 1),
                    event(id, "Product", 2),
                    event(id, "Product", 3),
                ],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let tail = store
            .get_events_for_aggregate_from_version(id, Version::new(2))
            .await
            .unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].version, Version::new(2));
    }

    #[tokio::test]
    async fn lists_ids_by_type_in_creation_order() {
        let store = InMemoryEventStore::new();
        let first = AggregateId::new();
        let second = AggregateId::new();
        let order = AggregateId::new();

        for (id, kind) in [(first, "Product"), (order, "Order"), (second, "Product")] {
            store
                .append(vec![event(id, kind, 1)], AppendOptions::expect_new())
                .await
                .unwrap();
        }
        store
            .append(
                vec![event(first, "Product", 2)],
                AppendOptions::expect_version(Version::first()),
            )
            .await
            .unwrap();

        let ids = store.list_aggregate_ids("Product").await.unwrap();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn version_of_unknown_aggregate_is_none() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();

        assert!(store.get_aggregate_version(id).await.unwrap().is_none());
        assert!(!store.aggregate_exists(id).await.unwrap());
    }

    #[tokio::test]
    async fn load_aggregate_starts_after_snapshot() {
        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        store
            .append(
                vec![event(id, "Product", 1), event(id, "Product", 2)],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        let snapshot =
            Snapshot::from_state(id, "Product", Version::first(), &serde_json::json!({})).unwrap();
        store.save_snapshot(snapshot).await.unwrap();

        let (snapshot, events) = store.load_aggregate(id).await.unwrap();
        assert_eq!(snapshot.unwrap().version, Version::first());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].version, Version::new(2));
    }
}
