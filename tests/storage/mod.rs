//! Shared storage integration tests.
//!
//! Tests the JournalStore and SnapshotStore contracts against all implementations.
//! Each backend test binary imports these test functions and runs them.

pub mod journal_store_tests;
pub mod snapshot_store_tests;
