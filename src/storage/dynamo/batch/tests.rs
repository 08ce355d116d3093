use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;

use super::*;

/// Scripted outcome for one BatchWriteItem call.
enum Outcome {
    /// Succeed, leaving the first `n` submitted requests unprocessed.
    Unprocessed(usize),
    Fail { retryable: bool },
}

/// Writer that replays a script, then succeeds.
struct ScriptedWriter {
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<Vec<usize>>,
}

impl ScriptedWriter {
    fn new(script: Vec<Outcome>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Request count of each call, in order.
    fn calls(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchWriter for ScriptedWriter {
    async fn write_batch(
        &self,
        _table: &str,
        requests: Vec<WriteRequest>,
    ) -> std::result::Result<Vec<WriteRequest>, BatchWriteFailure> {
        self.calls.lock().unwrap().push(requests.len());
        let outcome = self.script.lock().unwrap().pop_front();
        match outcome {
            None | Some(Outcome::Unprocessed(0)) => Ok(Vec::new()),
            Some(Outcome::Unprocessed(n)) => Ok(requests.into_iter().take(n).collect()),
            Some(Outcome::Fail { retryable }) => Err(BatchWriteFailure {
                retryable,
                message: "scripted failure".to_string(),
            }),
        }
    }
}

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        min_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    }
}

fn record(sequence: u64) -> EventRecord {
    EventRecord {
        aggregate_id: "A1".to_string(),
        sequence,
        event: "MappingCreated".to_string(),
        version: 1,
        created_at: Utc::now(),
        payload: json!({ "$event": "MappingCreated", "data": { "name": "Type1" } }),
    }
}

fn puts(records: &[EventRecord]) -> Vec<WriteRequest> {
    records
        .iter()
        .map(|r| codec::put_request(codec::event_item(r)).unwrap())
        .collect()
}

#[tokio::test]
async fn test_success_first_attempt() {
    let writer = ScriptedWriter::new(vec![]);
    let records: Vec<_> = (0..3).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert!(unprocessed.is_empty());
    assert_eq!(writer.calls(), vec![3]);
}

#[tokio::test]
async fn test_empty_batch_makes_no_call() {
    let writer = ScriptedWriter::new(vec![]);
    let unprocessed = retry_batch_write(&writer, "journal", vec![], &fast_retry())
        .await
        .unwrap();

    assert!(unprocessed.is_empty());
    assert!(writer.calls().is_empty());
}

#[tokio::test]
async fn test_retryable_failure_then_success() {
    let writer = ScriptedWriter::new(vec![Outcome::Fail { retryable: true }]);
    let records: Vec<_> = (0..2).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert!(unprocessed.is_empty());
    assert_eq!(writer.calls(), vec![2, 2]);
}

#[tokio::test]
async fn test_non_retryable_failure_surfaces_immediately() {
    let writer = ScriptedWriter::new(vec![Outcome::Fail { retryable: false }]);

    let result = retry_batch_write(&writer, "journal", puts(&[record(0)]), &fast_retry()).await;

    assert!(matches!(result, Err(StorageError::Dynamo(_))));
    assert_eq!(writer.calls(), vec![1]);
}

#[tokio::test]
async fn test_retries_exhausted_after_three_attempts() {
    let writer = ScriptedWriter::new(vec![
        Outcome::Fail { retryable: true },
        Outcome::Fail { retryable: true },
        Outcome::Fail { retryable: true },
    ]);

    let result = retry_batch_write(&writer, "journal", puts(&[record(0)]), &fast_retry()).await;

    match result {
        Err(StorageError::RetriesExhausted {
            table, attempts, ..
        }) => {
            assert_eq!(table, "journal");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(writer.calls(), vec![1, 1, 1]);
}

#[tokio::test]
async fn test_only_unprocessed_items_are_resubmitted() {
    let writer = ScriptedWriter::new(vec![Outcome::Unprocessed(2), Outcome::Unprocessed(1)]);
    let records: Vec<_> = (0..4).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert!(unprocessed.is_empty());
    assert_eq!(writer.calls(), vec![4, 2, 1]);
}

#[tokio::test]
async fn test_unprocessed_after_retries_are_returned() {
    let writer = ScriptedWriter::new(vec![
        Outcome::Unprocessed(2),
        Outcome::Unprocessed(2),
        Outcome::Unprocessed(1),
    ]);
    let records: Vec<_> = (0..3).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert_eq!(unprocessed.len(), 1);
    assert_eq!(
        codec::request_key(&unprocessed[0]),
        Some(RecordKey::new("A1", 0))
    );
}

#[tokio::test]
async fn test_large_batches_are_chunked() {
    let writer = ScriptedWriter::new(vec![]);
    let records: Vec<_> = (0..60).map(record).collect();

    retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    let mut calls = writer.calls();
    calls.sort_unstable();
    assert_eq!(calls, vec![10, 25, 25]);
}

#[tokio::test]
async fn test_failure_after_partial_progress_reports_pending() {
    let writer = ScriptedWriter::new(vec![
        Outcome::Unprocessed(1),
        Outcome::Fail { retryable: true },
        Outcome::Fail { retryable: true },
    ]);
    let records: Vec<_> = (0..3).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert_eq!(writer.calls(), vec![3, 1, 1]);
    let status = to_batch_status(&records, &unprocessed);
    let failed: Vec<u64> = status.errors.iter().map(|e| e.item.sequence).collect();
    assert_eq!(failed, vec![0]);
}

#[tokio::test]
async fn test_non_retryable_after_partial_progress_reports_pending() {
    let writer = ScriptedWriter::new(vec![
        Outcome::Unprocessed(2),
        Outcome::Fail { retryable: false },
    ]);
    let records: Vec<_> = (0..3).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    assert_eq!(writer.calls(), vec![3, 2]);
    assert_eq!(unprocessed.len(), 2);
}

#[tokio::test]
async fn test_failed_chunk_does_not_hide_written_chunk() {
    // The first chunk to call fails outright; the second succeeds.
    let writer = ScriptedWriter::new(vec![Outcome::Fail { retryable: false }]);
    let records: Vec<_> = (0..30).map(record).collect();

    let unprocessed = retry_batch_write(&writer, "journal", puts(&records), &fast_retry())
        .await
        .unwrap();

    let mut calls = writer.calls();
    calls.sort_unstable();
    assert_eq!(calls, vec![5, 25]);

    let status = to_batch_status(&records, &unprocessed);
    assert!(!status.success);
    let failed: Vec<u64> = status.errors.iter().map(|e| e.item.sequence).collect();
    assert_eq!(failed, (0..25).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_every_chunk_failing_is_an_error() {
    let writer = ScriptedWriter::new(vec![
        Outcome::Fail { retryable: false },
        Outcome::Fail { retryable: false },
    ]);
    let records: Vec<_> = (0..30).map(record).collect();

    let result = retry_batch_write(&writer, "journal", puts(&records), &fast_retry()).await;

    assert!(matches!(result, Err(StorageError::Dynamo(_))));
    let mut calls = writer.calls();
    calls.sort_unstable();
    assert_eq!(calls, vec![5, 25]);
}

#[test]
fn test_to_batch_status_reports_exactly_unprocessed() {
    let records: Vec<_> = (0..4).map(record).collect();
    let unprocessed = puts(&[records[1].clone(), records[3].clone()]);

    let status = to_batch_status(&records, &unprocessed);

    assert!(!status.success);
    let failed: Vec<u64> = status.errors.iter().map(|e| e.item.sequence).collect();
    assert_eq!(failed, vec![1, 3]);
    assert_eq!(
        status.errors[0].reason,
        "event MappingCreated for aggregate A1 at sequence 1 was not processed"
    );
}

#[test]
fn test_to_batch_status_ignores_foreign_requests() {
    let records = vec![record(0)];
    let foreign = codec::delete_request(&RecordKey::new("B7", 0)).unwrap();

    let status = to_batch_status(&records, &[foreign]);

    assert!(status.success);
    assert!(status.errors.is_empty());
}

#[test]
fn test_to_batch_status_for_deletes() {
    let keys = vec![RecordKey::new("A1", 0), RecordKey::new("A1", 1)];
    let unprocessed = vec![codec::delete_request(&keys[1]).unwrap()];

    let status = to_batch_status(&keys, &unprocessed);

    assert_eq!(status.errors.len(), 1);
    assert_eq!(status.errors[0].item, keys[1]);
    assert!(status.errors[0].reason.starts_with("delete for aggregate A1"));
}
