//! Channel transport connecting the host to a worker
//!
//! Workers are opaque executors; the host only ever talks to them through a
//! pair of message channels carrying versioned envelopes. A process-based
//! deployment would replace this module with a pipe transport speaking the
//! same envelopes.

use tokio::sync::mpsc;

use crate::error::{IpcError, IpcResult};
use crate::protocol::{MessageEnvelope, WorkerReply, WorkerRequest, PROTOCOL_VERSION};

/// One end of a host/worker channel pair
pub struct Endpoint<Out, In> {
    tx: mpsc::Sender<MessageEnvelope<Out>>,
    rx: mpsc::Receiver<MessageEnvelope<In>>,
}

/// Host side: sends requests, receives replies
pub type HostEndpoint = Endpoint<WorkerRequest, WorkerReply>;

/// Worker side: receives requests, sends replies
pub type WorkerEndpoint = Endpoint<WorkerReply, WorkerRequest>;

/// Create a connected host/worker endpoint pair
///
/// `capacity` bounds each direction independently; a full reply channel
/// suspends the worker, which is what gives pull-based consumers their
/// backpressure.
pub fn channel(capacity: usize) -> (HostEndpoint, WorkerEndpoint) {
    let (req_tx, req_rx) = mpsc::channel(capacity);
    let (reply_tx, reply_rx) = mpsc::channel(capacity);
    (
        Endpoint {
            tx: req_tx,
            rx: reply_rx,
        },
        Endpoint {
            tx: reply_tx,
            rx: req_rx,
        },
    )
}

impl<Out, In> Endpoint<Out, In> {
    /// Send a message wrapped in a versioned envelope
    pub async fn send(&self, message: Out) -> IpcResult<()> {
        self.tx
            .send(MessageEnvelope::new(message))
            .await
            .map_err(|_| IpcError::ChannelClosed)
    }

    /// Receive the next message, verifying the envelope version
    pub async fn recv(&mut self) -> IpcResult<MessageEnvelope<In>> {
        let envelope = self.rx.recv().await.ok_or(IpcError::ChannelClosed)?;
        if !envelope.is_compatible() {
            return Err(IpcError::ProtocolVersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: envelope.protocol_version,
            });
        }
        Ok(envelope)
    }

    /// Clone the outbound half, for out-of-band senders
    pub fn sender(&self) -> mpsc::Sender<MessageEnvelope<Out>> {
        self.tx.clone()
    }

    /// Split into raw channel halves
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<MessageEnvelope<Out>>,
        mpsc::Receiver<MessageEnvelope<In>>,
    ) {
        (self.tx, self.rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_reply_roundtrip() {
        let (host, mut worker) = channel(4);

        host.send(WorkerRequest::Shutdown).await.unwrap();
        let received = worker.recv().await.unwrap();
        assert!(matches!(received.message, WorkerRequest::Shutdown));
    }

    #[tokio::test]
    async fn test_recv_after_drop_is_closed() {
        let (host, mut worker) = channel(4);
        drop(host);
        assert_eq!(worker.recv().await.unwrap_err(), IpcError::ChannelClosed);
    }

    #[tokio::test]
    async fn test_out_of_band_sender() {
        let (mut host, worker) = channel(4);
        let tx = worker.sender();

        tx.send(MessageEnvelope::new(WorkerReply::Log {
            level: "info".to_string(),
            args: vec!["side channel".to_string()],
        }))
        .await
        .unwrap();

        let received = host.recv().await.unwrap();
        assert!(matches!(received.message, WorkerReply::Log { .. }));
    }
}
