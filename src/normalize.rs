//! Record normalization
//!
//! Pure transforms from raw call-activity objects to the two row shapes the
//! loader writes. No network or database access happens here; everything is
//! testable over in-memory values.
//!
//! Timestamps keep the provider's wall-clock reading but are reshaped for the
//! database engine, which is particular about datetime literals: the first 26
//! characters survive, the `T` separator becomes a space, and the zone suffix
//! is dropped. A timestamp the provider never sent stays null end-to-end;
//! it is never coerced to a sentinel value.

use crate::models::{CallActivity, CallRecordRow, CallRecordingRow};
use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Normalize a batch of raw call activity into record and recording rows.
/// Row order follows input order; recordings fan out per recording id.
pub fn normalize_batch(
    calls: &[CallActivity],
) -> Result<(Vec<CallRecordRow>, Vec<CallRecordingRow>)> {
    let mut records = Vec::with_capacity(calls.len());
    let mut recordings = Vec::new();

    for call in calls {
        let (record, mut call_recordings) = normalize_call(call)?;
        records.push(record);
        recordings.append(&mut call_recordings);
    }

    Ok((records, recordings))
}

/// Normalize one raw call into its record row and recording rows.
pub fn normalize_call(call: &CallActivity) -> Result<(CallRecordRow, Vec<CallRecordingRow>)> {
    let record = CallRecordRow {
        answer_time: sql_timestamp_opt(call.answer_time.as_deref()),
        end_time: sql_timestamp_opt(call.end_time.as_deref()),
        start_time: sql_timestamp_opt(call.start_time.as_deref()),
        direction: call.direction.clone(),
        disposition: coerce_int("disposition", &call.leg_id, &call.disposition)?,
        duration: coerce_int("duration", &call.leg_id, &call.duration)?,
        caller_name: call.caller.name.clone(),
        caller_number: call.caller.number.clone(),
        callee_name: call.callee.name.clone(),
        callee_number: call.callee.number.clone(),
        leg_id: call.leg_id.clone(),
        queue_id: call.queue.as_ref().map(|queue| queue.id.clone()),
        queue_name: call.queue.as_ref().map(|queue| queue.name.clone()),
    };

    let recordings = call
        .recording_ids
        .iter()
        .map(|recording_id| CallRecordingRow {
            leg_id: call.leg_id.clone(),
            recording_id: recording_id.clone(),
        })
        .collect();

    Ok((record, recordings))
}

/// An absent or empty timestamp stays null.
fn sql_timestamp_opt(raw: Option<&str>) -> Option<String> {
    raw.filter(|value| !value.is_empty()).map(sql_timestamp)
}

/// Truncate to 26 characters, then swap the `T` separator for a space and
/// drop the `Z` suffix.
fn sql_timestamp(raw: &str) -> String {
    let truncated: String = raw.chars().take(26).collect();
    truncated.replace('T', " ").replace('Z', "")
}

/// The provider sends numerics as numbers or numeric strings, depending on
/// the field and the day. Anything else is a data error that aborts the run.
fn coerce_int(field: &'static str, leg_id: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64))
            .with_context(|| format!("call {leg_id} carried an unrepresentable {field}: {number}")),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .with_context(|| format!("call {leg_id} carried a non-numeric {field}: {text:?}")),
        other => bail!("call {leg_id} carried a non-numeric {field}: {other}"),
    }
}
