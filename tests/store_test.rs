use call_sync::store::{CallStore, RecordingDedup};

mod common;

use common::{call_row, recording_row};

async fn memory_store() -> anyhow::Result<CallStore> {
    CallStore::connect("sqlite::memory:").await
}

async fn permanent_legs(store: &CallStore) -> anyhow::Result<Vec<String>> {
    Ok(
        sqlx::query_scalar::<_, String>("SELECT leg_id FROM call_records ORDER BY leg_id")
            .fetch_all(store.pool())
            .await?,
    )
}

async fn table_count(store: &CallStore, table: &str) -> anyhow::Result<i64> {
    Ok(
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(store.pool())
            .await?,
    )
}

#[tokio::test]
async fn test_identical_batch_merges_only_once() -> anyhow::Result<()> {
    let store = memory_store().await?;
    let batch = vec![call_row("leg-a"), call_row("leg-b")];

    let first = store.load_batch(&batch, &[], RecordingDedup::ByLeg).await?;
    assert_eq!(first.calls_merged, 2);
    assert_eq!(first.calls_duplicate(), 0);

    let second = store.load_batch(&batch, &[], RecordingDedup::ByLeg).await?;
    assert_eq!(second.calls_merged, 0);
    assert_eq!(second.calls_duplicate(), 2);

    assert_eq!(permanent_legs(&store).await?, vec!["leg-a", "leg-b"]);
    Ok(())
}

#[tokio::test]
async fn test_overlapping_batch_merges_only_novel_legs() -> anyhow::Result<()> {
    let store = memory_store().await?;

    let first = store
        .load_batch(
            &[call_row("leg-a"), call_row("leg-b")],
            &[],
            RecordingDedup::ByLeg,
        )
        .await?;
    assert_eq!(first.calls_merged, 2);
    assert_eq!(first.calls_duplicate(), 0);

    let second = store
        .load_batch(
            &[call_row("leg-a"), call_row("leg-c")],
            &[],
            RecordingDedup::ByLeg,
        )
        .await?;
    assert_eq!(second.calls_merged, 1);
    assert_eq!(second.calls_duplicate(), 1);

    assert_eq!(permanent_legs(&store).await?, vec!["leg-a", "leg-b", "leg-c"]);
    Ok(())
}

#[tokio::test]
async fn test_by_leg_dedup_freezes_a_legs_recording_set() -> anyhow::Result<()> {
    let store = memory_store().await?;

    let first = store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-1")],
            RecordingDedup::ByLeg,
        )
        .await?;
    assert_eq!(first.recordings_merged, 1);

    // A later run surfaces a second recording for the same leg; under the
    // by-leg key it never lands.
    let second = store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-2")],
            RecordingDedup::ByLeg,
        )
        .await?;
    assert_eq!(second.recordings_merged, 0);
    assert_eq!(second.recordings_duplicate(), 1);

    let count = table_count(&store, "call_recordings").await?;
    assert_eq!(count, 1);
    Ok(())
}

#[tokio::test]
async fn test_pairwise_dedup_admits_new_recordings_for_a_known_leg() -> anyhow::Result<()> {
    let store = memory_store().await?;

    store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-1")],
            RecordingDedup::ByLegAndRecording,
        )
        .await?;

    let second = store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-1"), recording_row("leg-a", "rec-2")],
            RecordingDedup::ByLegAndRecording,
        )
        .await?;
    assert_eq!(second.recordings_merged, 1);
    assert_eq!(second.recordings_duplicate(), 1);

    let count = table_count(&store, "call_recordings").await?;
    assert_eq!(count, 2);
    Ok(())
}

#[tokio::test]
async fn test_leftover_staging_rows_do_not_inflate_the_next_run() -> anyhow::Result<()> {
    let store = memory_store().await?;

    // Simulate a predecessor that staged rows and died before merging.
    let stale = call_row("leg-stale");
    sqlx::query(
        "INSERT INTO call_records_staging \
         (answer_time, end_time, start_time, direction, disposition, duration, \
          caller_name, caller_number, callee_name, callee_number, leg_id, queue_id, queue_name) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(stale.answer_time.as_deref())
    .bind(stale.end_time.as_deref())
    .bind(stale.start_time.as_deref())
    .bind(stale.direction.as_str())
    .bind(stale.disposition)
    .bind(stale.duration)
    .bind(stale.caller_name.as_str())
    .bind(stale.caller_number.as_str())
    .bind(stale.callee_name.as_str())
    .bind(stale.callee_number.as_str())
    .bind(stale.leg_id.as_str())
    .bind(stale.queue_id.as_deref())
    .bind(stale.queue_name.as_deref())
    .execute(store.pool())
    .await?;

    let report = store
        .load_batch(&[call_row("leg-b")], &[], RecordingDedup::ByLeg)
        .await?;

    assert_eq!(report.calls_attempted, 1);
    assert_eq!(report.calls_merged, 1);
    assert_eq!(permanent_legs(&store).await?, vec!["leg-b"]);
    Ok(())
}

#[tokio::test]
async fn test_staging_is_empty_after_a_successful_load() -> anyhow::Result<()> {
    let store = memory_store().await?;

    store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-1")],
            RecordingDedup::ByLeg,
        )
        .await?;

    assert_eq!(table_count(&store, "call_records_staging").await?, 0);
    assert_eq!(table_count(&store, "call_recordings_staging").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_failed_batch_leaves_no_trace() -> anyhow::Result<()> {
    let store = memory_store().await?;

    // Break the second staging insert so the load fails midway through.
    sqlx::query("DROP TABLE call_recordings_staging")
        .execute(store.pool())
        .await?;

    let result = store
        .load_batch(
            &[call_row("leg-a")],
            &[recording_row("leg-a", "rec-1")],
            RecordingDedup::ByLeg,
        )
        .await;
    assert!(result.is_err());

    assert!(permanent_legs(&store).await?.is_empty());
    assert_eq!(table_count(&store, "call_records_staging").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_empty_batch_is_a_clean_noop() -> anyhow::Result<()> {
    let store = memory_store().await?;

    let report = store.load_batch(&[], &[], RecordingDedup::ByLeg).await?;
    assert_eq!(report.calls_attempted, 0);
    assert_eq!(report.calls_merged, 0);
    assert_eq!(report.recordings_merged, 0);
    Ok(())
}
