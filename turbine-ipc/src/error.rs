//! IPC error types

use thiserror::Error;

/// IPC result type
pub type IpcResult<T> = Result<T, IpcError>;

/// IPC error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IpcError {
    /// The other end of the channel is gone
    #[error("channel closed")]
    ChannelClosed,

    /// Protocol version mismatch
    #[error("protocol version mismatch: expected {expected}, got {actual}")]
    ProtocolVersionMismatch { expected: u32, actual: u32 },

    /// Invalid message for the current protocol state
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl IpcError {
    /// Check if this error indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IpcError::ProtocolVersionMismatch { .. } | IpcError::InvalidMessage(_)
        )
    }
}
