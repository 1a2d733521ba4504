//! Error taxonomy for task execution

use serde::Serialize;
use thiserror::Error;
use turbine_ipc::WorkerErrorInfo;

/// Task execution result type
pub type TaskResult<T> = Result<T, TaskError>;

/// Task execution errors
///
/// Errors are `Clone` so that coalesced sharers all observe the same
/// settlement.
#[derive(Debug, Clone, Error, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskError {
    /// Cancellation token triggered, or already triggered at submit
    #[error("task aborted{}", reason_suffix(.reason))]
    Aborted { reason: Option<String> },

    /// Elapsed wall time exceeded the task's timeout
    #[error("task timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Acquisition fell through to a queue already at capacity
    #[error("acquisition queue full (max {max_size})")]
    QueueFull { max_size: usize },

    /// Worker-reported failure, worker crash, or non-zero exit before a reply
    #[error("worker error: {info}")]
    Worker { info: WorkerErrorInfo },

    /// Descriptor rejected at the host boundary
    #[error("validation failed for {field}: expected {expected}")]
    Validation { field: String, expected: String },
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl TaskError {
    /// Build a worker error from a serialized error object
    pub fn worker(info: WorkerErrorInfo) -> Self {
        TaskError::Worker { info }
    }

    /// Build a worker error for a process that exited mid-task
    pub fn worker_exit(code: i32) -> Self {
        TaskError::Worker {
            info: WorkerErrorInfo::new(
                "WorkerExit",
                format!("Worker exited with code {}", code),
            ),
        }
    }

    /// Build a validation error
    pub fn validation(field: impl Into<String>, expected: impl Into<String>) -> Self {
        TaskError::Validation {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Whether the retry controller may re-attempt after this error
    ///
    /// `Aborted` and `Timeout` reflect caller intent; retrying them would
    /// double the cancellation latency. `QueueFull` is left to the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Worker { .. })
    }
}

/// Outcome wrapper returned by safe-mode submissions
///
/// In safe mode the future never fails; failures are carried in the
/// `Rejected` variant instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SettledResult {
    Fulfilled { value: serde_json::Value },
    Rejected { error: TaskError },
}

impl SettledResult {
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, SettledResult::Fulfilled { .. })
    }

    pub fn value(&self) -> Option<&serde_json::Value> {
        match self {
            SettledResult::Fulfilled { value } => Some(value),
            SettledResult::Rejected { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            SettledResult::Fulfilled { .. } => None,
            SettledResult::Rejected { error } => Some(error),
        }
    }
}

impl From<TaskResult<serde_json::Value>> for SettledResult {
    fn from(result: TaskResult<serde_json::Value>) -> Self {
        match result {
            Ok(value) => SettledResult::Fulfilled { value },
            Err(error) => SettledResult::Rejected { error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_retryable_kinds() {
        assert!(TaskError::worker(WorkerErrorInfo::new("Error", "boom")).is_retryable());
        assert!(!TaskError::Aborted { reason: None }.is_retryable());
        assert!(!TaskError::Timeout { timeout_ms: 50 }.is_retryable());
        assert!(!TaskError::QueueFull { max_size: 10 }.is_retryable());
        assert!(!TaskError::validation("timeout", "positive duration").is_retryable());
    }

    #[test]
    fn test_display_includes_reason() {
        let error = TaskError::Aborted {
            reason: Some("caller gave up".to_string()),
        };
        assert_eq!(error.to_string(), "task aborted: caller gave up");
        assert_eq!(
            TaskError::Aborted { reason: None }.to_string(),
            "task aborted"
        );
    }

    #[test]
    fn test_worker_exit_message() {
        let error = TaskError::worker_exit(137);
        assert!(error.to_string().contains("Worker exited with code 137"));
    }

    #[test]
    fn test_settled_result_wrapping() {
        let fulfilled = SettledResult::from(Ok(json!(5)));
        assert!(fulfilled.is_fulfilled());
        assert_eq!(fulfilled.value(), Some(&json!(5)));

        let rejected = SettledResult::from(Err(TaskError::Timeout { timeout_ms: 10 }));
        assert!(!rejected.is_fulfilled());
        assert_eq!(
            rejected.error(),
            Some(&TaskError::Timeout { timeout_ms: 10 })
        );
    }
}
