//! # Transport Bindings
//!
//! The kernel talks to clients over three endpoints:
//!
//! - **Request/response** (ROUTER): requests arrive prefixed with routing
//!   identities; replies reuse them to reach the original requester.
//! - **Broadcast** (PUB): one-way fan-out of status and output events.
//! - **Heartbeat** (REP): echoes every payload verbatim for liveness checks.
//!
//! Each socket is owned by a single task. Outgoing multipart messages are
//! queued on an [`Outbox`] and written in queue order by that task, so sends
//! on one endpoint never interleave even when they originate from execution
//! engine tasks.
//!
//! [`zmq`] binds the real sockets; [`memory`] provides channel-backed doubles
//! with the same handle types.

pub mod memory;
pub mod zmq;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{constants, KernelError, Result};

/// One multipart message, frame by frame
pub type Frames = Vec<Bytes>;

/// Default number of inbound requests buffered before the socket task waits
pub const DEFAULT_INBOUND_CAPACITY: usize = 64;

/// Queue handle for one outgoing endpoint.
#[derive(Debug, Clone)]
pub struct Outbox {
    name: &'static str,
    tx: mpsc::UnboundedSender<Frames>,
}

impl Outbox {
    pub fn new(name: &'static str, tx: mpsc::UnboundedSender<Frames>) -> Self {
        Self { name, tx }
    }

    /// Create an outbox together with the receiving end its socket task drains
    pub fn channel(name: &'static str) -> (Self, mpsc::UnboundedReceiver<Frames>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(name, tx), rx)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue one multipart message. Fails once the owning task is gone.
    pub fn send(&self, frames: Frames) -> Result<()> {
        if frames.is_empty() {
            return Err(KernelError::TransportError(
                constants::ERR_EMPTY_MULTIPART.to_string(),
            ));
        }
        self.tx
            .send(frames)
            .map_err(|_| KernelError::ConnectionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Kernel-side handles for the request/response and broadcast endpoints.
#[derive(Debug)]
pub struct KernelChannels {
    /// Multipart requests as received, routing identities first
    pub shell_in: mpsc::Receiver<Frames>,
    /// Replies on the request/response endpoint
    pub shell_out: Outbox,
    /// Broadcasts
    pub iopub: Outbox,
}

/// Total payload size of a multipart message
pub fn frames_len(frames: &[Bytes]) -> u64 {
    frames.iter().map(|f| f.len() as u64).sum()
}
