//! Turbine worker protocol
//!
//! Message types, versioned envelopes, and the channel transport used
//! between the Turbine host and its pool of workers.

pub mod error;
pub mod protocol;
pub mod transport;

pub use error::{IpcError, IpcResult};
pub use protocol::{
    MessageEnvelope, TurboChunkResult, TurboOp, TurboPayload, WorkerErrorInfo, WorkerReply,
    WorkerRequest, PROTOCOL_VERSION,
};
pub use transport::{channel, Endpoint, HostEndpoint, WorkerEndpoint};
