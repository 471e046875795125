//! Deduplicating loader
//!
//! Writes a batch of normalized rows into permanent storage exactly once per
//! call leg, however often the fetch windows overlap. The load is set-based:
//! the batch lands in staging tables, a merge copies only the rows whose key
//! is not already present in the permanent tables, and staging is cleared.
//!
//! One transaction covers the whole sequence, leading truncate included, so a
//! run that dies at any point leaves the permanent tables untouched and the
//! next run starts from clean staging. Uniqueness of `leg_id` in
//! `call_records` is maintained by the merge predicate, not a schema
//! constraint.

use crate::models::{CallRecordRow, CallRecordingRow};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::debug;

/// Which key decides that a staged recording is a duplicate. Selected once
/// from configuration at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordingDedup {
    /// Presence of any recording for the leg suppresses all further
    /// recordings for that leg, matching the long-standing behavior of the
    /// production loader. A leg's recording set freezes after the first run
    /// that lands any recording for it.
    ByLeg,
    /// The `(leg_id, recording_id)` pair; later runs can add recordings to a
    /// leg that already has some.
    ByLegAndRecording,
}

/// Attempted vs. merged counts for one batch; the difference per table is
/// the number of duplicates skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub calls_attempted: u64,
    pub calls_merged: u64,
    pub recordings_attempted: u64,
    pub recordings_merged: u64,
}

impl MergeReport {
    pub fn calls_duplicate(&self) -> u64 {
        self.calls_attempted - self.calls_merged
    }

    pub fn recordings_duplicate(&self) -> u64 {
        self.recordings_attempted - self.recordings_merged
    }
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS call_records (
        answer_time   TEXT,
        end_time      TEXT,
        start_time    TEXT,
        direction     TEXT NOT NULL,
        disposition   INTEGER NOT NULL,
        duration      INTEGER NOT NULL,
        caller_name   TEXT NOT NULL,
        caller_number TEXT NOT NULL,
        callee_name   TEXT NOT NULL,
        callee_number TEXT NOT NULL,
        leg_id        TEXT NOT NULL,
        queue_id      TEXT,
        queue_name    TEXT
    );",
    "CREATE TABLE IF NOT EXISTS call_recordings (
        leg_id        TEXT NOT NULL,
        recording_id  TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS call_records_staging (
        answer_time   TEXT,
        end_time      TEXT,
        start_time    TEXT,
        direction     TEXT NOT NULL,
        disposition   INTEGER NOT NULL,
        duration      INTEGER NOT NULL,
        caller_name   TEXT NOT NULL,
        caller_number TEXT NOT NULL,
        callee_name   TEXT NOT NULL,
        callee_number TEXT NOT NULL,
        leg_id        TEXT NOT NULL,
        queue_id      TEXT,
        queue_name    TEXT
    );",
    "CREATE TABLE IF NOT EXISTS call_recordings_staging (
        leg_id        TEXT NOT NULL,
        recording_id  TEXT NOT NULL
    );",
];

const STAGE_CALL: &str = "INSERT INTO call_records_staging \
    (answer_time, end_time, start_time, direction, disposition, duration, \
     caller_name, caller_number, callee_name, callee_number, leg_id, queue_id, queue_name) \
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);";

const STAGE_RECORDING: &str =
    "INSERT INTO call_recordings_staging (leg_id, recording_id) VALUES (?, ?);";

const MERGE_CALLS: &str = "\
    INSERT INTO call_records \
      (answer_time, end_time, start_time, direction, disposition, duration, \
       caller_name, caller_number, callee_name, callee_number, leg_id, queue_id, queue_name) \
    SELECT stage.answer_time, stage.end_time, stage.start_time, stage.direction, \
           stage.disposition, stage.duration, stage.caller_name, stage.caller_number, \
           stage.callee_name, stage.callee_number, stage.leg_id, stage.queue_id, stage.queue_name \
      FROM call_records_staging stage \
     WHERE stage.leg_id NOT IN (SELECT leg_id FROM call_records);";

const MERGE_RECORDINGS_BY_LEG: &str = "\
    INSERT INTO call_recordings (leg_id, recording_id) \
    SELECT stage.leg_id, stage.recording_id \
      FROM call_recordings_staging stage \
     WHERE stage.leg_id NOT IN (SELECT leg_id FROM call_recordings);";

const MERGE_RECORDINGS_BY_PAIR: &str = "\
    INSERT INTO call_recordings (leg_id, recording_id) \
    SELECT stage.leg_id, stage.recording_id \
      FROM call_recordings_staging stage \
     WHERE NOT EXISTS (SELECT 1 FROM call_recordings existing \
                        WHERE existing.leg_id = stage.leg_id \
                          AND existing.recording_id = stage.recording_id);";

/// The staged, deduplicating loader over one exclusive database connection.
pub struct CallStore {
    pool: SqlitePool,
}

impl CallStore {
    /// Open the store and bootstrap the schema. The pool is capped at one
    /// connection: a run owns the staging tables exclusively, and nothing in
    /// the pipeline runs database work concurrently.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .context("invalid database URL")?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("failed to connect to the database")?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("failed to create schema")?;
        }
        Ok(())
    }

    /// Stage the batch, merge only novel rows into the permanent tables, and
    /// clear staging, all inside one transaction. Any database error rolls
    /// the whole load back.
    pub async fn load_batch(
        &self,
        records: &[CallRecordRow],
        recordings: &[CallRecordingRow],
        recording_dedup: RecordingDedup,
    ) -> Result<MergeReport> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to open the load transaction")?;

        // A crashed predecessor may have left rows behind; they must not
        // count against this batch.
        sqlx::query("DELETE FROM call_records_staging;")
            .execute(&mut *tx)
            .await
            .context("failed to clear call_records_staging")?;
        sqlx::query("DELETE FROM call_recordings_staging;")
            .execute(&mut *tx)
            .await
            .context("failed to clear call_recordings_staging")?;

        for record in records {
            sqlx::query(STAGE_CALL)
                .bind(record.answer_time.as_deref())
                .bind(record.end_time.as_deref())
                .bind(record.start_time.as_deref())
                .bind(record.direction.as_str())
                .bind(record.disposition)
                .bind(record.duration)
                .bind(record.caller_name.as_str())
                .bind(record.caller_number.as_str())
                .bind(record.callee_name.as_str())
                .bind(record.callee_number.as_str())
                .bind(record.leg_id.as_str())
                .bind(record.queue_id.as_deref())
                .bind(record.queue_name.as_deref())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to stage call record {}", record.leg_id))?;
        }

        for recording in recordings {
            sqlx::query(STAGE_RECORDING)
                .bind(recording.leg_id.as_str())
                .bind(recording.recording_id.as_str())
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to stage recording for leg {}", recording.leg_id))?;
        }

        let calls_merged = sqlx::query(MERGE_CALLS)
            .execute(&mut *tx)
            .await
            .context("failed to merge call records")?
            .rows_affected();
        sqlx::query("DELETE FROM call_records_staging;")
            .execute(&mut *tx)
            .await
            .context("failed to truncate call_records_staging")?;

        let merge_recordings = match recording_dedup {
            RecordingDedup::ByLeg => MERGE_RECORDINGS_BY_LEG,
            RecordingDedup::ByLegAndRecording => MERGE_RECORDINGS_BY_PAIR,
        };
        let recordings_merged = sqlx::query(merge_recordings)
            .execute(&mut *tx)
            .await
            .context("failed to merge call recordings")?
            .rows_affected();
        sqlx::query("DELETE FROM call_recordings_staging;")
            .execute(&mut *tx)
            .await
            .context("failed to truncate call_recordings_staging")?;

        tx.commit()
            .await
            .context("failed to commit the load transaction")?;

        debug!(
            calls = records.len(),
            calls_merged,
            recordings = recordings.len(),
            recordings_merged,
            "batch merged"
        );

        Ok(MergeReport {
            calls_attempted: records.len() as u64,
            calls_merged,
            recordings_attempted: recordings.len() as u64,
            recordings_merged,
        })
    }
}
