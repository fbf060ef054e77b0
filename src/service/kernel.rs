//! Kernel instance: endpoints, codec, handlers and the request loop.
//!
//! Nothing here is global. [`Kernel::start`] binds real sockets from a
//! configuration; [`Kernel::new`] builds a kernel over any
//! [`KernelChannels`], such as the in-memory pair used in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{KernelConfig, KernelIdentity};
use crate::core::codec::MessageCodec;
use crate::core::signer::Signer;
use crate::error::{KernelError, Result};
use crate::protocol::dispatcher::{Dispatched, Dispatcher};
use crate::service::engine::ExecutionEngine;
use crate::service::orchestrator::{register_handlers, Responder};
use crate::transport::zmq::{self, BoundEndpoints, SocketTasks, DRAIN_TIMEOUT};
use crate::transport::{frames_len, Frames, KernelChannels, DEFAULT_INBOUND_CAPACITY};
use crate::utils::metrics::{Metrics, Timer};

/// State shared with request handlers
pub struct KernelContext {
    responder: Responder,
    engine: Arc<dyn ExecutionEngine>,
    identity: KernelIdentity,
    shutdown_requested: AtomicBool,
}

impl KernelContext {
    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn engine(&self) -> &dyn ExecutionEngine {
        self.engine.as_ref()
    }

    pub fn identity(&self) -> &KernelIdentity {
        &self.identity
    }

    /// Ask the request loop to stop after the current message
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

/// Fate of one multipart arrival on the request/response endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A handler ran
    Handled,
    /// Authenticated but no handler for its type
    Unsupported,
    /// Signature mismatch; dropped silently
    Unauthenticated,
    /// Bad framing or undecodable JSON; dropped silently
    Malformed,
}

pub struct Kernel {
    ctx: KernelContext,
    dispatcher: Dispatcher<KernelContext>,
    shell_in: mpsc::Receiver<Frames>,
    metrics: Arc<Metrics>,
    sockets: Option<SocketTasks>,
}

impl Kernel {
    /// Build a kernel over already-connected channels.
    pub fn new(
        channels: KernelChannels,
        signer: Signer,
        identity: KernelIdentity,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Result<Self> {
        let metrics = Arc::new(Metrics::new());
        let responder = Responder::new(
            Arc::new(MessageCodec::new(signer)),
            channels.shell_out,
            channels.iopub,
            metrics.clone(),
        );

        let dispatcher = Dispatcher::new();
        register_handlers(&dispatcher)?;
        debug!(handlers = ?dispatcher.message_types(), "Request handlers registered");

        Ok(Self {
            ctx: KernelContext {
                responder,
                engine,
                identity,
                shutdown_requested: AtomicBool::new(false),
            },
            dispatcher,
            shell_in: channels.shell_in,
            metrics,
            sockets: None,
        })
    }

    /// Validate `config`, bind all three endpoints and build the kernel.
    ///
    /// Any bind failure is returned before anything is served.
    #[instrument(skip_all)]
    pub async fn start(config: &KernelConfig, engine: Arc<dyn ExecutionEngine>) -> Result<Self> {
        config.validate_strict()?;
        let signer = config.connection.signer()?;
        if signer.is_unsigned() {
            warn!("Connection key is empty, message signing is disabled");
        }

        let (channels, sockets) = zmq::bind(&config.connection, DEFAULT_INBOUND_CAPACITY).await?;
        let mut kernel = Self::new(channels, signer, config.identity.clone(), engine)?;
        kernel.sockets = Some(sockets);
        Ok(kernel)
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Bound addresses when started from a configuration
    pub fn endpoints(&self) -> Option<&BoundEndpoints> {
        self.sockets.as_ref().map(SocketTasks::endpoints)
    }

    pub fn context(&self) -> &KernelContext {
        &self.ctx
    }

    /// Whether requests of `msg_type` are answered
    pub fn supports(&self, msg_type: &str) -> bool {
        self.dispatcher.handles(msg_type)
    }

    /// Parse, authenticate and dispatch one multipart request.
    ///
    /// Unauthenticated and malformed requests are dropped without a reply.
    /// Errors are handler failures, such as a closed endpoint queue.
    pub fn handle_frames(&self, frames: Frames) -> Result<Disposition> {
        let _timer = Timer::start("handle_frames");
        self.metrics.message_received(frames_len(&frames));

        let msg = match self.ctx.responder().codec().parse(frames) {
            Ok(msg) => msg,
            Err(KernelError::AuthenticationFailed) => {
                debug!("Dropping message with invalid signature");
                self.metrics.authentication_failure();
                return Ok(Disposition::Unauthenticated);
            }
            Err(e) => {
                debug!(error = %e, "Dropping malformed message");
                self.metrics.malformed_message();
                return Ok(Disposition::Malformed);
            }
        };

        match self.dispatcher.dispatch(&self.ctx, &msg) {
            Ok(Dispatched::Handled) => {
                self.metrics.message_dispatched();
                Ok(Disposition::Handled)
            }
            Ok(Dispatched::Unsupported) => {
                self.metrics.unsupported_message();
                Ok(Disposition::Unsupported)
            }
            Err(KernelError::MalformedMessage(reason)) => {
                debug!(%reason, msg_type = msg.msg_type(), "Dropping malformed request");
                self.metrics.malformed_message();
                Ok(Disposition::Malformed)
            }
            Err(e) => {
                self.metrics.handler_error();
                Err(e)
            }
        }
    }

    /// Serve requests until a `shutdown_request` or the request endpoint closes.
    pub async fn run(self) -> Result<()> {
        let (_tx, rx) = mpsc::channel::<()>(1);
        self.run_with_shutdown(rx).await
    }

    /// Serve requests until `shutdown_rx` fires, a `shutdown_request` arrives,
    /// or the request endpoint closes.
    #[instrument(skip_all)]
    pub async fn run_with_shutdown(mut self, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        info!("Kernel serving requests");

        loop {
            tokio::select! {
                Some(()) = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                frames = self.shell_in.recv() => {
                    let Some(frames) = frames else {
                        info!("Request endpoint closed");
                        break;
                    };
                    match self.handle_frames(frames) {
                        Ok(_) => {}
                        Err(KernelError::ConnectionClosed) => {
                            error!("Outgoing endpoint closed, stopping");
                            break;
                        }
                        Err(e) => error!(error = %e, "Request handler failed"),
                    }
                    if self.ctx.shutdown_requested() {
                        break;
                    }
                }
            }
        }

        self.metrics.log_metrics();

        // Dropping the kernel releases its outbox handles so the socket
        // tasks can flush and exit.
        let sockets = self.sockets.take();
        drop(self);
        if let Some(sockets) = sockets {
            sockets.close(DRAIN_TIMEOUT).await;
        }
        info!("Kernel stopped");
        Ok(())
    }
}
