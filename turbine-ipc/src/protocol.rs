//! Worker protocol definitions and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u32 = 1;

/// Messages sent from the host to worker processes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Run a callable to a single result
    Execute {
        #[serde(rename = "fn")]
        callable: String,
        args: Vec<JsonValue>,
        context: Option<Map<String, JsonValue>>,
        /// Values moved by ownership rather than copied
        #[serde(skip_serializing_if = "Option::is_none")]
        transfer: Option<Vec<JsonValue>>,
        correlation_id: Uuid,
    },

    /// Run an incremental producer on the generator pool
    ExecuteStream {
        #[serde(rename = "fn")]
        callable: String,
        args: Vec<JsonValue>,
        context: Option<Map<String, JsonValue>>,
        correlation_id: Uuid,
    },

    /// Process one contiguous chunk of a parallel array operation
    TurboChunk {
        op: TurboOp,
        #[serde(rename = "fn")]
        callable: String,
        context: Option<Map<String, JsonValue>>,
        payload: TurboPayload,
        /// Seed value for reduce chunks
        #[serde(skip_serializing_if = "Option::is_none")]
        init: Option<JsonValue>,
        worker_index: usize,
        correlation_id: Uuid,
    },

    /// Drain and exit
    Shutdown,
}

/// Parallel array operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurboOp {
    Map,
    Filter,
    Reduce,
}

impl fmt::Display for TurboOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurboOp::Map => write!(f, "map"),
            TurboOp::Filter => write!(f, "filter"),
            TurboOp::Reduce => write!(f, "reduce"),
        }
    }
}

/// Chunk payload for a parallel array operation
///
/// The `Float64` variant shares the input buffer between the host and every
/// worker; a channel transport hands the `Arc` over without copying, while a
/// process transport serializes the buffer contents (the per-chunk copy
/// fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum TurboPayload {
    /// Chunk slice shipped in the message body
    Values { items: Vec<JsonValue> },

    /// Shared numeric buffer plus the half-open range this worker owns
    Float64 {
        buffer: Arc<Vec<f64>>,
        start: usize,
        end: usize,
    },
}

impl TurboPayload {
    /// Number of items in this chunk
    pub fn len(&self) -> usize {
        match self {
            TurboPayload::Values { items } => items.len(),
            TurboPayload::Float64 { start, end, .. } => end.saturating_sub(*start),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Messages sent from worker processes to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    /// Single-shot execution succeeded
    Completed {
        correlation_id: Uuid,
        value: JsonValue,
    },

    /// Execution failed; the error object is copied verbatim to the caller
    Failed {
        correlation_id: Uuid,
        error: WorkerErrorInfo,
    },

    /// Out-of-band log line, forwarded to the host logger
    Log { level: String, args: Vec<String> },

    /// Incremental producer emitted a value
    Yield {
        correlation_id: Uuid,
        value: JsonValue,
    },

    /// Incremental producer return value; at most once, before `End`
    Return {
        correlation_id: Uuid,
        value: JsonValue,
    },

    /// Incremental producer finished cleanly
    End { correlation_id: Uuid },

    /// Chunk of a parallel array operation completed
    TurboComplete {
        correlation_id: Uuid,
        worker_index: usize,
        result: TurboChunkResult,
        items_processed: usize,
    },

    /// Chunk of a parallel array operation failed
    TurboError {
        correlation_id: Uuid,
        worker_index: usize,
        error: WorkerErrorInfo,
    },
}

/// Result of one chunk of a parallel array operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "repr", rename_all = "snake_case")]
pub enum TurboChunkResult {
    /// Mapped or filtered items in input order
    Values { items: Vec<JsonValue> },

    /// Mapped items from the typed fast path
    Float64 { items: Vec<f64> },

    /// Partial reduction of the chunk
    Partial { value: JsonValue },
}

/// Serialized error object crossing the worker boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerErrorInfo {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl WorkerErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

impl fmt::Display for WorkerErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Message envelope for all host/worker communications
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub protocol_version: u32,
    pub timestamp: DateTime<Utc>,
    pub message: T,
}

impl<T> MessageEnvelope<T> {
    /// Wrap a message in a versioned envelope
    pub fn new(message: T) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            timestamp: Utc::now(),
            message,
        }
    }

    /// Check if the protocol version is compatible
    pub fn is_compatible(&self) -> bool {
        self.protocol_version == PROTOCOL_VERSION
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_request_roundtrip() {
        let request = WorkerRequest::Execute {
            callable: "add".to_string(),
            args: vec![json!(2), json!(3)],
            context: None,
            transfer: None,
            correlation_id: Uuid::new_v4(),
        };

        let encoded = serde_json::to_string(&request).unwrap();
        assert!(encoded.contains("\"type\":\"execute\""));
        assert!(encoded.contains("\"fn\":\"add\""));

        let decoded: WorkerRequest = serde_json::from_str(&encoded).unwrap();
        match decoded {
            WorkerRequest::Execute { callable, args, .. } => {
                assert_eq!(callable, "add");
                assert_eq!(args, vec![json!(2), json!(3)]);
            }
            other => panic!("unexpected decoded request: {:?}", other),
        }
    }

    #[test]
    fn test_reply_tags() {
        let reply = WorkerReply::Completed {
            correlation_id: Uuid::new_v4(),
            value: json!(5),
        };
        let encoded = serde_json::to_string(&reply).unwrap();
        assert!(encoded.contains("\"type\":\"completed\""));

        let log = WorkerReply::Log {
            level: "info".to_string(),
            args: vec!["hello".to_string()],
        };
        let encoded = serde_json::to_string(&log).unwrap();
        assert!(encoded.contains("\"type\":\"log\""));
    }

    #[test]
    fn test_float64_payload_len() {
        let payload = TurboPayload::Float64 {
            buffer: Arc::new(vec![1.0, 2.0, 3.0, 4.0]),
            start: 1,
            end: 3,
        };
        assert_eq!(payload.len(), 2);
        assert!(!payload.is_empty());

        let empty = TurboPayload::Values { items: vec![] };
        assert!(empty.is_empty());
    }

    #[test]
    fn test_worker_error_display() {
        let error = WorkerErrorInfo::new("TypeError", "x is not a function")
            .with_stack("at line 1");
        assert_eq!(error.to_string(), "TypeError: x is not a function");
        assert_eq!(error.stack.as_deref(), Some("at line 1"));
    }

    #[test]
    fn test_message_envelope_version() {
        let envelope = MessageEnvelope::new(WorkerRequest::Shutdown);
        assert_eq!(envelope.protocol_version, PROTOCOL_VERSION);
        assert!(envelope.is_compatible());

        let encoded = serde_json::to_string(&envelope).unwrap();
        let decoded: MessageEnvelope<WorkerRequest> = serde_json::from_str(&encoded).unwrap();
        assert!(decoded.is_compatible());
    }
}
