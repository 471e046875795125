use call_sync::models::{CallRecordRow, CallRecordingRow};

pub fn call_row(leg_id: &str) -> CallRecordRow {
    CallRecordRow {
        answer_time: Some("2024-01-02 03:04:10.000000".to_string()),
        end_time: Some("2024-01-02 03:05:00.000000".to_string()),
        start_time: Some("2024-01-02 03:04:05.000000".to_string()),
        direction: "inbound".to_string(),
        disposition: 2,
        duration: 50,
        caller_name: "Ada Lovelace".to_string(),
        caller_number: "1001".to_string(),
        callee_name: "Support".to_string(),
        callee_number: "+15550001111".to_string(),
        leg_id: leg_id.to_string(),
        queue_id: None,
        queue_name: None,
    }
}

pub fn recording_row(leg_id: &str, recording_id: &str) -> CallRecordingRow {
    CallRecordingRow {
        leg_id: leg_id.to_string(),
        recording_id: recording_id.to_string(),
    }
}
