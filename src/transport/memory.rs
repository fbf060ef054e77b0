//! In-process transport doubles.
//!
//! Gives a kernel the same [`KernelChannels`] it gets from bound sockets, with
//! the client side exposed as plain channels. Used by tests and by hosts that
//! embed the kernel without a message bus.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};

use super::{Frames, KernelChannels, Outbox};

/// Client-side ends of an in-memory kernel connection
#[derive(Debug)]
pub struct ClientChannels {
    /// Submit requests, routing identities first
    pub shell: mpsc::Sender<Frames>,
    /// Replies sent on the request/response endpoint
    pub replies: mpsc::UnboundedReceiver<Frames>,
    /// Everything broadcast by the kernel
    pub broadcasts: mpsc::UnboundedReceiver<Frames>,
}

impl ClientChannels {
    /// Drain whatever replies and broadcasts are queued right now
    pub fn drain(&mut self) -> (Vec<Frames>, Vec<Frames>) {
        let mut replies = Vec::new();
        while let Ok(frames) = self.replies.try_recv() {
            replies.push(frames);
        }
        let mut broadcasts = Vec::new();
        while let Ok(frames) = self.broadcasts.try_recv() {
            broadcasts.push(frames);
        }
        (replies, broadcasts)
    }
}

/// Create a connected kernel/client pair
pub fn pair(capacity: usize) -> (KernelChannels, ClientChannels) {
    let (shell_tx, shell_rx) = mpsc::channel(capacity.max(1));
    let (shell_out, replies) = Outbox::channel("shell");
    let (iopub, broadcasts) = Outbox::channel("iopub");

    let kernel = KernelChannels {
        shell_in: shell_rx,
        shell_out,
        iopub,
    };
    let client = ClientChannels {
        shell: shell_tx,
        replies,
        broadcasts,
    };
    (kernel, client)
}

/// Spawn an in-memory heartbeat: every message sent on the returned sender
/// comes back unmodified on the returned receiver.
pub fn heartbeat(capacity: usize) -> (mpsc::Sender<Frames>, mpsc::Receiver<Frames>, JoinHandle<()>) {
    let (ping_tx, ping_rx) = mpsc::channel(capacity.max(1));
    let (pong_tx, pong_rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(serve_heartbeat(ping_rx, pong_tx));
    (ping_tx, pong_rx, task)
}

#[instrument(skip_all)]
async fn serve_heartbeat(mut ping_rx: mpsc::Receiver<Frames>, pong_tx: mpsc::Sender<Frames>) {
    while let Some(frames) = ping_rx.recv().await {
        if pong_tx.send(frames).await.is_err() {
            break;
        }
    }
    debug!("In-memory heartbeat stopped");
}
