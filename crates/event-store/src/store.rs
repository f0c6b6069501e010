use std::collections::HashSet;

use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventStoreError, Result, Snapshot, Version};

/// Options for appending events to one stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendOptions {
    /// Version the stream must be at for the append to succeed.
    /// `None` skips the check (the version uniqueness rule still applies).
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// No expected-version check.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }

    /// Picks `expect_new` for an unsaved aggregate, `expect_version` otherwise.
    pub fn after(version: Version) -> Self {
        if version == Version::initial() {
            Self::expect_new()
        } else {
            Self::expect_version(version)
        }
    }
}

/// Pending events for a single aggregate stream.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub events: Vec<EventEnvelope>,
    pub options: AppendOptions,
}

impl StreamAppend {
    pub fn aggregate_id(&self) -> Option<AggregateId> {
        self.events.first().map(|e| e.aggregate_id)
    }

    /// Version of the last event in this append.
    pub fn last_version(&self) -> Option<Version> {
        self.events.last().map(|e| e.version)
    }
}

/// A set of stream appends that commit together or not at all.
///
/// Every stream's expected version is checked before anything is written,
/// so a transaction touching an order and a product cannot half-apply.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    streams: Vec<StreamAppend>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stream append. Empty event lists are ignored.
    pub fn append(&mut self, events: Vec<EventEnvelope>, options: AppendOptions) -> &mut Self {
        if !events.is_empty() {
            self.streams.push(StreamAppend { events, options });
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn streams(&self) -> &[StreamAppend] {
        &self.streams
    }

    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }

    pub fn into_streams(self) -> Vec<StreamAppend> {
        self.streams
    }
}

/// Core trait for event store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Commits every stream append in `transaction` atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any stream is not at its expected
    /// version, or if another writer claims one of the versions first. On
    /// failure nothing is written.
    ///
    /// Returns the new version of each stream, in transaction order.
    async fn commit(&self, transaction: Transaction) -> Result<Vec<Version>>;

    /// Retrieves all events for an aggregate, oldest first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events from `from_version` onward (inclusive).
    async fn get_events_for_aggregate_from_version(
        &self,
        aggregate_id: AggregateId,
        from_version: Version,
    ) -> Result<Vec<EventEnvelope>>;

    /// Returns the current version of an aggregate, or None if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Lists the ids of every stream of the given type, in creation order.
    async fn list_aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>>;

    /// Saves a snapshot, replacing any previous one for the aggregate.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    async fn get_snapshot(&self, aggregate_id: AggregateId) -> Result<Option<Snapshot>>;
}

/// Convenience methods available on every event store.
#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        let mut transaction = Transaction::new();
        transaction.append(events, options);

        self.commit(transaction)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EventStoreError::InvalidAppend("no events to append".to_string()))
    }

    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }

    /// Loads the latest snapshot (if any) and the events after it.
    async fn load_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<(Option<Snapshot>, Vec<EventEnvelope>)> {
        if let Some(snapshot) = self.get_snapshot(aggregate_id).await? {
            let events = self
                .get_events_for_aggregate_from_version(aggregate_id, snapshot.version.next())
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.get_events_for_aggregate(aggregate_id).await?;
            Ok((None, events))
        }
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks the shape of a transaction before any backend touches it.
pub fn validate_transaction(transaction: &Transaction) -> Result<()> {
    if transaction.is_empty() {
        return Err(EventStoreError::InvalidAppend(
            "transaction has no events".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stream in transaction.streams() {
        validate_stream(stream)?;

        let first = &stream.events[0];
        if !seen.insert(first.aggregate_id) {
            return Err(EventStoreError::InvalidAppend(format!(
                "aggregate {} appears more than once in a transaction",
                first.aggregate_id
            )));
        }
    }

    Ok(())
}

fn validate_stream(stream: &StreamAppend) -> Result<()> {
    let Some(first) = stream.events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty event list".to_string(),
        ));
    };

    if let Some(expected) = stream.options.expected_version
        && first.version != expected.next()
    {
        return Err(EventStoreError::InvalidAppend(format!(
            "first event version {} does not follow expected version {}",
            first.version, expected
        )));
    }

    let mut expected_version = first.version;
    for event in stream.events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id {
            return Err(EventStoreError::InvalidAppend(
                "all events in a stream append must share an aggregate".to_string(),
            ));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events in a stream append must share an aggregate type".to_string(),
            ));
        }

        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
