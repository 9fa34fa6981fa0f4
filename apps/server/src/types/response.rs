// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Response types for the API.

use bim2log_processing::Stage;
use serde::{Deserialize, Serialize};

/// Pipeline result as returned by `/api/v1/process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// The serialized pipeline output.
    pub data: serde_json::Value,
    /// Cache key for this result (SHA256 over uploads and options).
    pub cache_key: String,
    /// Processing statistics.
    pub stats: ProcessingStats,
}

/// Processing statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Elements in the normalized table.
    pub element_count: usize,
    /// Rows in the final schedule.
    pub task_count: usize,
    /// Elements resolved to a task.
    pub matched_count: usize,
    /// Floors found by floor assignment.
    pub floor_count: usize,
    /// Total processing time (ms).
    pub total_time_ms: u64,
    /// Whether result was from cache.
    pub from_cache: bool,
}

/// Server-Sent Event types for streaming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A pipeline stage finished.
    Status {
        stage: Option<Stage>,
        message: String,
    },

    /// The whole result in one event.
    Result { data: serde_json::Value },

    /// The result follows as raw JSON text chunks.
    ResultStart {
        message: String,
        total_bytes: usize,
        chunks: usize,
    },

    /// All result chunks have been sent.
    ResultEnd,

    /// Processing complete.
    Complete {
        message: String,
        cache_key: String,
        stats: ProcessingStats,
    },

    /// Error occurred.
    Error { kind: String, message: String },
}

/// One SSE frame: a typed event, or a raw slice of the result document.
#[derive(Debug, Clone)]
pub enum SseMessage {
    Event(StreamEvent),
    Chunk(String),
}

impl From<StreamEvent> for SseMessage {
    fn from(event: StreamEvent) -> Self {
        SseMessage::Event(event)
    }
}

impl SseMessage {
    /// Text placed in the SSE `data:` field.
    pub fn into_data(self) -> String {
        match self {
            SseMessage::Chunk(text) => text,
            SseMessage::Event(event) => serde_json::to_string(&event).unwrap_or_else(|e| {
                format!(
                    r#"{{"type":"error","kind":"INTERNAL_ERROR","message":"{}"}}"#,
                    e.to_string().replace('"', "'")
                )
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_a_type_tag() {
        let status = SseMessage::from(StreamEvent::Status {
            stage: Some(Stage::FloorAssignment),
            message: "Assigned 3 elements to 2 floors".into(),
        })
        .into_data();
        let value: serde_json::Value = serde_json::from_str(&status).unwrap();
        assert_eq!(value["type"], "status");
        assert_eq!(value["stage"], "floor_assignment");

        let end: serde_json::Value =
            serde_json::from_str(&SseMessage::from(StreamEvent::ResultEnd).into_data()).unwrap();
        assert_eq!(end["type"], "result_end");
    }

    #[test]
    fn chunks_are_sent_verbatim() {
        assert_eq!(SseMessage::Chunk("{\"data\":".into()).into_data(), "{\"data\":");
    }
}
