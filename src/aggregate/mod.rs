//! Aggregate lifecycle: command handling, event application, rehydration.
//!
//! A concrete domain implements [`Aggregate`]: pure decision and evolution
//! functions over [`State`]. [`AggregateRoot`] drives those functions against
//! the journal and snapshot stores named in an [`AggregateConfig`]. It is a
//! single-owner value (`&mut self` for every write), and [`AggregateHandle`]
//! wraps one in a task so commands for an id are serialized.

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, SnapshotsConfig};
use crate::error::{AggregateError, Result};
use crate::message::{Event, Message, Snapshot};
use crate::state::State;
use crate::storage::{
    self, BatchStatus, JournalStore, MemoryJournalStore, MemorySnapshotStore, SnapshotStore,
};

mod actor;

pub use actor::AggregateHandle;

/// Domain rules of one aggregate type.
///
/// Both functions are pure: no I/O, no side effects.
pub trait Aggregate: Send + Sync + 'static {
    /// Aggregate type name, e.g. `"mapping"`.
    const KIND: &'static str;

    /// Domain object carried by `State::Active` and `State::Deleted`.
    type State: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Command: Message;
    type Event: Message;

    /// Validate `command` against `state` and decide on zero or one event.
    ///
    /// `Ok(None)` means the command is accepted but changes nothing.
    /// `Err` rejects it and leaves the aggregate untouched.
    fn handle(
        aggregate_id: &str,
        state: &State<Self::State>,
        command: Self::Command,
    ) -> Result<Option<Self::Event>>;

    /// Fold one event into the state.
    ///
    /// Fails with `InvalidTransition` when the event cannot follow `state`.
    fn apply(
        aggregate_id: &str,
        state: State<Self::State>,
        event: &Self::Event,
    ) -> Result<State<Self::State>>;
}

/// Which stores an aggregate uses, and how it snapshots.
#[derive(Clone)]
pub struct AggregateConfig {
    pub journal: Arc<dyn JournalStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
    pub snapshot: SnapshotsConfig,
}

impl AggregateConfig {
    pub fn new(journal: Arc<dyn JournalStore>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            journal,
            snapshots,
            snapshot: SnapshotsConfig::default(),
        }
    }

    pub fn with_snapshots(mut self, snapshot: SnapshotsConfig) -> Self {
        self.snapshot = snapshot;
        self
    }

    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryJournalStore::new()),
            Arc::new(MemorySnapshotStore::new()),
        )
    }

    /// Build the configured stores.
    pub async fn from_config(config: &Config) -> storage::Result<Self> {
        let (journal, snapshots) = storage::init_storage(&config.storage).await?;
        Ok(Self::new(journal, snapshots).with_snapshots(config.snapshots.clone()))
    }
}

/// One aggregate instance: its id, current state and sequence counter.
pub struct AggregateRoot<A: Aggregate> {
    aggregate_id: String,
    config: AggregateConfig,
    next_sequence: u64,
    snapshot_sequence: Option<u64>,
    state: State<A::State>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// A fresh instance in state `New`. Call [`rehydrate`](Self::rehydrate)
    /// before handling commands for an id that may already have history.
    pub fn new(aggregate_id: impl Into<String>, config: AggregateConfig) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            config,
            next_sequence: 0,
            snapshot_sequence: None,
            state: State::New,
            _aggregate: PhantomData,
        }
    }

    /// Construct and rehydrate.
    pub async fn load(aggregate_id: impl Into<String>, config: AggregateConfig) -> Result<Self> {
        let mut root = Self::new(aggregate_id, config);
        root.rehydrate().await?;
        Ok(root)
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn current_state(&self) -> &State<A::State> {
        &self.state
    }

    /// Sequence of the last applied event, if any.
    pub fn last_sequence(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    /// Sequence of the snapshot this instance was seeded from or last wrote.
    pub fn snapshot_sequence(&self) -> Option<u64> {
        self.snapshot_sequence
    }

    fn storage_error(&self, source: storage::StorageError) -> AggregateError {
        AggregateError::storage(&self.aggregate_id, source)
    }

    fn partial_failure<T>(&self, status: BatchStatus<T>) -> AggregateError {
        AggregateError::PartialFailure {
            aggregate_id: self.aggregate_id.clone(),
            reasons: status.reasons(),
        }
    }

    /// Handle one command.
    ///
    /// The next state is computed first, then the event is persisted, and
    /// only then are state and counter updated. Any failure leaves the
    /// instance as it was.
    #[tracing::instrument(
        name = "aggregate.handle",
        skip_all,
        fields(kind = A::KIND, aggregate_id = %self.aggregate_id, command = command.tag())
    )]
    pub async fn handle(&mut self, command: A::Command) -> Result<State<A::State>> {
        let Some(payload) = A::handle(&self.aggregate_id, &self.state, command)? else {
            debug!("Command produced no event");
            return Ok(self.state.clone());
        };

        let event = Event::new(&self.aggregate_id, self.next_sequence, payload);
        let next = A::apply(&self.aggregate_id, self.state.clone(), &event.payload)?;
        let event = self.save(event).await?;

        self.state = next;
        self.next_sequence = event.sequence + 1;
        debug!(
            sequence = event.sequence,
            event = event.payload.tag(),
            state = self.state.tag(),
            "Event applied"
        );

        self.maybe_snapshot().await;
        Ok(self.state.clone())
    }

    /// Persist a single event through the journal.
    pub async fn save(&self, event: Event<A::Event>) -> Result<Event<A::Event>> {
        let record = event.to_record()?;
        let status = self
            .config
            .journal
            .save_all(vec![record])
            .await
            .map_err(|e| self.storage_error(e))?;

        if !status.success {
            return Err(self.partial_failure(status));
        }
        Ok(event)
    }

    /// Rebuild state from the latest snapshot plus every later event.
    #[tracing::instrument(
        name = "aggregate.rehydrate",
        skip_all,
        fields(kind = A::KIND, aggregate_id = %self.aggregate_id)
    )]
    pub async fn rehydrate(&mut self) -> Result<State<A::State>> {
        let snapshot = if self.config.snapshot.read {
            self.load_snapshot().await?
        } else {
            None
        };

        let (mut state, start, snapshot_sequence) = match snapshot {
            Some(snapshot) => (
                snapshot.state,
                snapshot.sequence + 1,
                Some(snapshot.sequence),
            ),
            None => (State::New, 0, None),
        };

        let last = self
            .config
            .journal
            .get_last_sequence(&self.aggregate_id, start)
            .await
            .map_err(|e| self.storage_error(e))?;

        let mut next = start;
        if let Some(last) = last {
            let mut records = self
                .config
                .journal
                .get_events(&self.aggregate_id, start, last)
                .await
                .map_err(|e| self.storage_error(e))?;
            records.sort_by_key(|r| r.sequence);

            for record in records {
                if record.sequence != next {
                    return Err(self.sequence_gap(next, record.sequence));
                }
                let event = Event::<A::Event>::from_record(record)?;
                state = A::apply(&self.aggregate_id, state, &event.payload)?;
                next += 1;
            }

            if next != last + 1 {
                return Err(self.sequence_gap(next, last));
            }
        }

        self.state = state;
        self.next_sequence = next;
        self.snapshot_sequence = snapshot_sequence;

        debug!(
            snapshot = ?snapshot_sequence,
            replayed = next - start,
            state = self.state.tag(),
            "Rehydrated"
        );
        Ok(self.state.clone())
    }

    fn sequence_gap(&self, expected: u64, found: u64) -> AggregateError {
        AggregateError::SequenceGap {
            aggregate_id: self.aggregate_id.clone(),
            expected,
            found,
        }
    }

    async fn load_snapshot(&self) -> Result<Option<Snapshot<State<A::State>>>> {
        self.config
            .snapshots
            .get(&self.aggregate_id)
            .await
            .map_err(|e| self.storage_error(e))?
            .map(Snapshot::from_record)
            .transpose()
    }

    /// Snapshot after every `interval` events. The event is already durable,
    /// so a failed snapshot write is logged rather than returned.
    async fn maybe_snapshot(&mut self) {
        let config = &self.config.snapshot;
        if config.interval == 0 || !config.write || self.next_sequence % config.interval != 0 {
            return;
        }
        if let Err(e) = self.snapshot().await {
            warn!(error = %e, "Snapshot write failed");
        }
    }

    /// Capture the current state at the last applied sequence.
    ///
    /// Returns `None` when no event has been applied yet, or when snapshot
    /// writes are disabled in [`SnapshotsConfig`].
    pub async fn snapshot(&mut self) -> Result<Option<Snapshot<State<A::State>>>> {
        if !self.config.snapshot.write {
            debug!(aggregate_id = %self.aggregate_id, "Snapshot writes disabled");
            return Ok(None);
        }
        let Some(sequence) = self.last_sequence() else {
            return Ok(None);
        };

        let snapshot = Snapshot {
            aggregate_id: self.aggregate_id.clone(),
            sequence,
            state: self.state.clone(),
        };
        self.config
            .snapshots
            .save(snapshot.to_record()?)
            .await
            .map_err(|e| self.storage_error(e))?;

        self.snapshot_sequence = Some(sequence);
        debug!(aggregate_id = %self.aggregate_id, sequence, "Snapshot saved");
        Ok(Some(snapshot))
    }

    /// Prune history behind a fresh snapshot.
    ///
    /// Writes a snapshot at the last applied sequence, then deletes journal
    /// events up to and including it and any older snapshots. Nothing is
    /// pruned unless the snapshot write succeeded, so with snapshot writes
    /// disabled this is a no-op. Returns the snapshot sequence, or `None`
    /// if nothing was compacted.
    pub async fn compact(&mut self) -> Result<Option<u64>> {
        let Some(snapshot) = self.snapshot().await? else {
            return Ok(None);
        };
        let sequence = snapshot.sequence;

        let journal = self
            .config
            .journal
            .rollforward_to(&self.aggregate_id, sequence)
            .await
            .map_err(|e| self.storage_error(e))?;
        if !journal.success {
            return Err(self.partial_failure(journal));
        }

        if sequence > 0 {
            let snapshots = self
                .config
                .snapshots
                .rollforward_to(&self.aggregate_id, sequence - 1)
                .await
                .map_err(|e| self.storage_error(e))?;
            if !snapshots.success {
                return Err(self.partial_failure(snapshots));
            }
        }

        info!(aggregate_id = %self.aggregate_id, sequence, "Compacted history");
        Ok(Some(sequence))
    }

    /// Delete events at or after `sequence` and rebuild state.
    ///
    /// Recovery after a partial batch failure. Refuses to cut into history
    /// already covered by the latest stored snapshot.
    pub async fn rollback_to(&mut self, sequence: u64) -> Result<State<A::State>> {
        let stored = self
            .config
            .snapshots
            .get(&self.aggregate_id)
            .await
            .map_err(|e| self.storage_error(e))?
            .map(|s| s.sequence);

        if let Some(snapshot) = stored.into_iter().chain(self.snapshot_sequence).max() {
            if sequence <= snapshot {
                return Err(AggregateError::RollbackBelowSnapshot {
                    aggregate_id: self.aggregate_id.clone(),
                    sequence,
                    snapshot,
                });
            }
        }

        let status = self
            .config
            .journal
            .rollback_to(&self.aggregate_id, sequence)
            .await
            .map_err(|e| self.storage_error(e))?;
        if !status.success {
            return Err(self.partial_failure(status));
        }

        info!(aggregate_id = %self.aggregate_id, sequence, "Rolled back journal");
        self.rehydrate().await
    }
}
