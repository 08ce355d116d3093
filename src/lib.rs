//! cmodel-es - event-sourced aggregate persistence
//!
//! Content-model entities (Mappings and Nodes) evolve through commands,
//! emit sequenced events into a journal, and are rebuilt on demand from the
//! latest snapshot plus the events after it.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod message;
pub mod state;
pub mod storage;
pub mod utils;

pub use aggregate::{Aggregate, AggregateConfig, AggregateHandle, AggregateRoot};
pub use error::{AggregateError, Result};
pub use message::{Event, EventRecord, Message, RecordKey, Snapshot, SnapshotRecord};
pub use state::State;
pub use storage::{BatchStatus, ErrorStatus, JournalStore, SnapshotStore, StorageError};
