//! ZeroMQ bindings for the three kernel endpoints.
//!
//! All three sockets are bound before any task is spawned, so a failure on
//! any one of them leaves nothing serving.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use zeromq::{PubSocket, RepSocket, RouterSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

use super::{Frames, KernelChannels, Outbox};
use crate::config::ConnectionInfo;
use crate::error::{KernelError, Result};

/// Consecutive receive errors after which the heartbeat gives up
const MAX_HEARTBEAT_ERRORS: u32 = 16;

/// How long writer tasks get to flush queued messages on shutdown
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Addresses the sockets actually bound to (ephemeral ports resolved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundEndpoints {
    pub shell: String,
    pub iopub: String,
    pub heartbeat: String,
}

impl BoundEndpoints {
    /// Port of a `tcp://host:port` address
    pub fn port_of(address: &str) -> Option<u16> {
        address.rsplit(':').next().and_then(|p| p.parse().ok())
    }
}

/// Socket tasks backing a running kernel. Dropping it aborts them.
#[derive(Debug)]
pub struct SocketTasks {
    endpoints: BoundEndpoints,
    heartbeat: Option<JoinHandle<()>>,
    writers: Vec<JoinHandle<()>>,
}

impl SocketTasks {
    pub fn endpoints(&self) -> &BoundEndpoints {
        &self.endpoints
    }

    /// Stop the heartbeat and let the writer tasks flush their queues.
    ///
    /// Writers finish once every [`Outbox`] clone is gone; any still running
    /// after `grace` are aborted.
    pub async fn close(mut self, grace: Duration) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        for mut task in self.writers.drain(..) {
            if timeout(grace, &mut task).await.is_err() {
                warn!("Endpoint queue not drained in time, aborting");
                task.abort();
            }
        }
    }

    fn abort(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.abort();
        }
        for task in self.writers.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SocketTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Bind the request/response, broadcast and heartbeat endpoints.
///
/// Returns the kernel-side channels and the task guard owning the sockets.
#[instrument(skip(conn), fields(ip = %conn.ip))]
pub async fn bind(conn: &ConnectionInfo, capacity: usize) -> Result<(KernelChannels, SocketTasks)> {
    let mut heartbeat = RepSocket::new();
    let hb_endpoint = bind_socket(&mut heartbeat, &conn.heartbeat_address()).await?;

    let mut iopub = PubSocket::new();
    let iopub_endpoint = bind_socket(&mut iopub, &conn.iopub_address()).await?;

    let mut shell = RouterSocket::new();
    let shell_endpoint = bind_socket(&mut shell, &conn.shell_address()).await?;

    let endpoints = BoundEndpoints {
        shell: shell_endpoint,
        iopub: iopub_endpoint,
        heartbeat: hb_endpoint,
    };
    info!(
        shell = %endpoints.shell,
        iopub = %endpoints.iopub,
        heartbeat = %endpoints.heartbeat,
        "Kernel endpoints bound"
    );

    let (shell_in_tx, shell_in) = mpsc::channel(capacity.max(1));
    let (shell_out, shell_out_rx) = Outbox::channel("shell");
    let (iopub_out, iopub_rx) = Outbox::channel("iopub");

    let sockets = SocketTasks {
        endpoints,
        heartbeat: Some(tokio::spawn(heartbeat_loop(heartbeat))),
        writers: vec![
            tokio::spawn(broadcast_loop(iopub, iopub_rx)),
            tokio::spawn(shell_loop(shell, shell_in_tx, shell_out_rx)),
        ],
    };

    let channels = KernelChannels {
        shell_in,
        shell_out,
        iopub: iopub_out,
    };
    Ok((channels, sockets))
}

async fn bind_socket<S: Socket>(socket: &mut S, address: &str) -> Result<String> {
    socket
        .bind(address)
        .await
        .map(|endpoint| endpoint.to_string())
        .map_err(|e| KernelError::BindError {
            endpoint: address.to_string(),
            reason: e.to_string(),
        })
}

fn to_zmq(frames: Frames) -> Result<ZmqMessage> {
    ZmqMessage::try_from(frames).map_err(|e| KernelError::TransportError(e.to_string()))
}

/// Echo every heartbeat payload back untouched.
async fn heartbeat_loop(mut socket: RepSocket) {
    let mut failures = 0u32;
    loop {
        match socket.recv().await {
            Ok(ping) => {
                failures = 0;
                if let Err(e) = socket.send(ping).await {
                    warn!(error = %e, "Heartbeat echo failed");
                }
            }
            Err(e) => {
                failures += 1;
                warn!(error = %e, failures, "Heartbeat receive failed");
                if failures >= MAX_HEARTBEAT_ERRORS {
                    error!("Heartbeat endpoint failing repeatedly, stopping");
                    break;
                }
            }
        }
    }
}

/// Drain the broadcast queue onto the PUB socket.
async fn broadcast_loop(mut socket: PubSocket, mut queue: mpsc::UnboundedReceiver<Frames>) {
    while let Some(frames) = queue.recv().await {
        let sent = match to_zmq(frames) {
            Ok(message) => socket.send(message).await.map_err(KernelError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(error = %e, "Broadcast send failed");
        }
    }
    debug!("Broadcast queue closed");
}

/// Forward requests to the kernel and write its replies, one at a time.
async fn shell_loop(
    mut socket: RouterSocket,
    inbound: mpsc::Sender<Frames>,
    mut outbound: mpsc::UnboundedReceiver<Frames>,
) {
    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Ok(message) => {
                    let frames: Vec<Bytes> = message.into_vec();
                    debug!(frames = frames.len(), "Request received");
                    if inbound.send(frames).await.is_err() {
                        debug!("Kernel no longer reading requests, dropping");
                    }
                }
                Err(e) => warn!(error = %e, "Request receive failed"),
            },
            outgoing = outbound.recv() => match outgoing {
                Some(frames) => {
                    let sent = match to_zmq(frames) {
                        Ok(message) => socket.send(message).await.map_err(KernelError::from),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = sent {
                        warn!(error = %e, "Reply send failed");
                    }
                }
                None => break,
            },
        }
    }
    debug!("Request/response endpoint stopped");
}
