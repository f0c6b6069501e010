//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{
    AppendOptions, EventEnvelope, EventStore, EventStoreExt, Snapshot, Transaction, Version,
};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, DomainEvent, SnapshotCapable};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

impl<A: Aggregate> CommandResult<A> {
    /// Applies events that have just been committed and advances the version.
    pub fn from_committed(mut aggregate: A, events: Vec<A::Event>) -> Self {
        let new_version = aggregate.version().advance(events.len());
        aggregate.apply_events(events.iter().cloned());
        aggregate.set_version(new_version);

        Self {
            aggregate,
            events,
            new_version,
        }
    }

    /// A result for a command that produced no events.
    pub fn unchanged(aggregate: A) -> Self {
        let new_version = aggregate.version();
        Self {
            aggregate,
            events: vec![],
            new_version,
        }
    }
}

/// Trait for commands that target a single aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Loads aggregates from an event store and persists their new events.
///
/// A command either goes through [`execute`](Self::execute), which commits a
/// single stream, or is [`stage`](Self::stage)d into a [`Transaction`] shared
/// with other aggregates and committed by the caller.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for CommandHandler<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate + DeserializeOwned,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate from the event store.
    ///
    /// If the aggregate doesn't exist, returns a default instance.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let (snapshot, events) = self.store.load_aggregate(aggregate_id).await?;

        let mut aggregate = match snapshot {
            Some(snapshot) => restore_from_snapshot(snapshot)?,
            None => A::default(),
        };

        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Loads an aggregate that must already exist.
    pub async fn load_required(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Loads every aggregate of this type, in creation order.
    pub async fn load_all(&self) -> Result<Vec<A>, DomainError> {
        let ids = self.store.list_aggregate_ids(A::aggregate_type()).await?;

        let mut aggregates = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(aggregate) = self.load_existing(id).await? {
                aggregates.push(aggregate);
            }
        }
        Ok(aggregates)
    }

    /// Adds `events` to `transaction` as the continuation of `aggregate`'s
    /// stream, expecting the stream to still be at `aggregate.version()`.
    pub fn stage(
        &self,
        transaction: &mut Transaction,
        aggregate_id: AggregateId,
        aggregate: &A,
        events: &[A::Event],
    ) -> Result<(), DomainError> {
        let current_version = aggregate.version();
        let envelopes = build_envelopes::<A>(aggregate_id, current_version, events)?;
        transaction.append(envelopes, AppendOptions::after(current_version));
        Ok(())
    }

    /// Commits `events` for a loaded aggregate on their own.
    pub async fn persist(
        &self,
        aggregate_id: AggregateId,
        aggregate: A,
        events: Vec<A::Event>,
    ) -> Result<CommandResult<A>, DomainError> {
        if events.is_empty() {
            return Ok(CommandResult::unchanged(aggregate));
        }

        let mut transaction = Transaction::new();
        self.stage(&mut transaction, aggregate_id, &aggregate, &events)?;
        self.store.commit(transaction).await?;

        Ok(CommandResult::from_committed(aggregate, events))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        let events = command_fn(&aggregate)?;
        self.persist(aggregate_id, aggregate, events).await
    }
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: SnapshotCapable,
{
    /// Saves a snapshot when the aggregate sits on a snapshot boundary.
    ///
    /// The events are already committed, so a failed snapshot write is logged
    /// and otherwise ignored.
    pub async fn snapshot_if_due(&self, aggregate: &A) {
        if !aggregate.should_snapshot() {
            return;
        }
        let Some(aggregate_id) = aggregate.id() else {
            return;
        };

        let result = match Snapshot::from_state(
            aggregate_id,
            A::aggregate_type(),
            aggregate.version(),
            aggregate,
        ) {
            Ok(snapshot) => self.store.save_snapshot(snapshot).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => tracing::debug!(
                aggregate_type = A::aggregate_type(),
                %aggregate_id,
                version = %aggregate.version(),
                "saved snapshot"
            ),
            Err(e) => tracing::warn!(
                aggregate_type = A::aggregate_type(),
                %aggregate_id,
                error = %e,
                "failed to save snapshot"
            ),
        }
    }
}

/// Builds envelopes numbered consecutively after `current_version`.
fn build_envelopes<A: Aggregate>(
    aggregate_id: AggregateId,
    current_version: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut version = current_version;

    for event in events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .payload(event)?
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}

fn restore_from_snapshot<A>(snapshot: Snapshot) -> Result<A, DomainError>
where
    A: Aggregate + DeserializeOwned,
{
    let version = snapshot.version;
    let mut aggregate: A = snapshot.into_state()?;
    aggregate.set_version(version);
    Ok(aggregate)
}
