//! Core Data Models
//!
//! This module defines the data structures on both sides of the pipeline.
//!
//! ## Data Flow
//!
//! 1. **Wire format**: [`ReportPage`], [`CallerSummary`], [`CallActivity`] -
//!    deserialized straight from the reports API responses
//! 2. **Row format**: [`CallRecordRow`], [`CallRecordingRow`] - the fixed
//!    shapes produced by [`crate::normalize`] and consumed by the loader
//!
//! The provider leaves timestamps out entirely for calls that were never
//! answered or never completed; those fields are `Option` on the wire and
//! stay null all the way into the permanent tables. `disposition` and
//! `duration` arrive as whatever scalar the provider felt like sending that
//! day, so they are held as raw JSON values until normalization coerces them.

use serde::{Deserialize, Serialize};

/// One page of a reports API response
#[derive(Debug, Clone, Deserialize)]
pub struct ReportPage<T> {
    pub items: Vec<T>,
}

/// One row of the site-wide activity summary: enough to drive a per-user
/// detail fetch, never persisted
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerSummary {
    pub user_id: String,
    pub user_name: String,
}

/// One raw call-activity object from the per-user report
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallActivity {
    #[serde(default)]
    pub answer_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    pub direction: String,
    pub disposition: serde_json::Value,
    pub duration: serde_json::Value,
    pub caller: CallParty,
    pub callee: CallParty,
    pub leg_id: String,
    #[serde(default)]
    pub queue: Option<CallQueue>,
    #[serde(default)]
    pub recording_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallParty {
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallQueue {
    pub id: String,
    pub name: String,
}

/// Token endpoint response; only the access token is consumed
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// A normalized call record, one per leg, keyed by `leg_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecordRow {
    pub answer_time: Option<String>,
    pub end_time: Option<String>,
    pub start_time: Option<String>,
    pub direction: String,
    pub disposition: i64,
    pub duration: i64,
    pub caller_name: String,
    pub caller_number: String,
    pub callee_name: String,
    pub callee_number: String,
    pub leg_id: String,
    pub queue_id: Option<String>,
    pub queue_name: Option<String>,
}

/// A normalized call-recording link; a leg may own several
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecordingRow {
    pub leg_id: String,
    pub recording_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_activity_from_provider_json() {
        let raw = r#"{
            "answerTime": "2024-01-02T03:04:10.000000Z",
            "endTime": "2024-01-02T03:05:00.000000Z",
            "startTime": "2024-01-02T03:04:05.000000Z",
            "direction": "inbound",
            "disposition": 2,
            "duration": 50,
            "caller": {"name": "Ada Lovelace", "number": "1001"},
            "callee": {"name": "Support", "number": "+15550001111"},
            "legId": "leg-a",
            "queue": {"id": "q-1", "name": "support"},
            "recordingIds": ["rec-1", "rec-2"]
        }"#;

        let call: CallActivity = serde_json::from_str(raw).unwrap();
        assert_eq!(call.leg_id, "leg-a");
        assert_eq!(call.recording_ids.len(), 2);
        assert_eq!(call.queue.as_ref().unwrap().name, "support");
    }

    #[test]
    fn test_absent_optional_fields_deserialize_as_none() {
        let raw = r#"{
            "direction": "outbound",
            "disposition": "4",
            "duration": 0,
            "caller": {"name": "Ada Lovelace", "number": "1001"},
            "callee": {"name": "Voicemail", "number": "*86"},
            "legId": "leg-b"
        }"#;

        let call: CallActivity = serde_json::from_str(raw).unwrap();
        assert!(call.answer_time.is_none());
        assert!(call.queue.is_none());
        assert!(call.recording_ids.is_empty());
    }

    #[test]
    fn test_caller_summary_page() {
        let raw = r#"{"items": [{"userId": "u-1", "userName": "Ada Lovelace"}]}"#;
        let page: ReportPage<CallerSummary> = serde_json::from_str(raw).unwrap();
        assert_eq!(page.items[0].user_id, "u-1");
    }
}
