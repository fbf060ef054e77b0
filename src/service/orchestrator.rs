//! Request handlers and the ordered emission of replies and broadcasts.
//!
//! For `execute_request` the order on the wire is fixed:
//!
//! 1. input echo broadcast (from [`ExecutionTask::before_run`])
//! 2. `execute_reply` on the request/response endpoint
//! 3. output or error broadcast
//!
//! Steps 2 and 3 are emitted together from [`ExecutionTask::complete`].

use serde::Serialize;
use serde_json::Map;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::KernelIdentity;
use crate::core::codec::MessageCodec;
use crate::error::{constants, KernelError, Result};
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::message::{
    msg_type, ErrorBroadcast, ExecuteReplyError, ExecuteReplyOk, InputEcho, KernelInfoReply,
    Message, OutputBroadcast, ReplyStatus, ShutdownReply,
};
use crate::service::engine::{ExecutionOutcome, ExecutionResult, ExecutionTask};
use crate::service::kernel::KernelContext;
use crate::transport::Outbox;
use crate::utils::metrics::Metrics;

/// Signs and queues messages on the kernel's two outgoing endpoints.
#[derive(Debug, Clone)]
pub struct Responder {
    codec: Arc<MessageCodec>,
    shell: Outbox,
    iopub: Outbox,
    metrics: Arc<Metrics>,
}

impl Responder {
    pub fn new(codec: Arc<MessageCodec>, shell: Outbox, iopub: Outbox, metrics: Arc<Metrics>) -> Self {
        Self {
            codec,
            shell,
            iopub,
            metrics,
        }
    }

    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// Reply on the request/response endpoint
    pub fn reply<C: Serialize + ?Sized>(&self, origin: &Message, msg_type: &str, content: &C) -> Result<()> {
        let bytes = self.codec.respond(&self.shell, origin, msg_type, content)?;
        self.metrics.message_sent(bytes);
        Ok(())
    }

    /// Broadcast to every subscriber
    pub fn broadcast<C: Serialize + ?Sized>(&self, origin: &Message, msg_type: &str, content: &C) -> Result<()> {
        let bytes = self.codec.respond(&self.iopub, origin, msg_type, content)?;
        self.metrics.message_sent(bytes);
        Ok(())
    }

    pub(crate) fn input_echo(&self, origin: &Message, execution_count: u32, code: &str) -> Result<()> {
        self.broadcast(
            origin,
            msg_type::INPUT_ECHO,
            &InputEcho {
                execution_count,
                code,
            },
        )
    }

    pub(crate) fn execution_finished(&self, origin: &Message, result: &ExecutionResult) -> Result<()> {
        let execution_count = result.execution_count;
        match &result.outcome {
            ExecutionOutcome::Success { data } => {
                debug!(execution_count, "Execution succeeded");
                self.reply(
                    origin,
                    msg_type::EXECUTE_REPLY,
                    &ExecuteReplyOk::new(execution_count),
                )?;
                self.broadcast(
                    origin,
                    msg_type::OUTPUT,
                    &OutputBroadcast {
                        execution_count,
                        data,
                        metadata: Map::new(),
                    },
                )
            }
            ExecutionOutcome::Error(error) => {
                debug!(execution_count, ename = %error.ename, "Execution failed");
                self.reply(
                    origin,
                    msg_type::EXECUTE_REPLY,
                    &ExecuteReplyError {
                        status: ReplyStatus::Error,
                        execution_count,
                        ename: error.ename.clone(),
                        evalue: error.evalue.clone(),
                        traceback: error.traceback.clone(),
                    },
                )?;
                self.broadcast(
                    origin,
                    msg_type::ERROR,
                    &ErrorBroadcast {
                        execution_count,
                        ename: &error.ename,
                        evalue: &error.evalue,
                        traceback: &error.traceback,
                    },
                )
            }
        }
    }
}

/// Register the kernel's request handlers.
pub fn register_handlers(dispatcher: &Dispatcher<KernelContext>) -> Result<()> {
    dispatcher.register(msg_type::KERNEL_INFO_REQUEST, kernel_info)?;
    dispatcher.register(msg_type::EXECUTE_REQUEST, execute)?;
    dispatcher.register(msg_type::SHUTDOWN_REQUEST, shutdown)?;
    Ok(())
}

fn kernel_info(ctx: &KernelContext, msg: &Message) -> Result<()> {
    let identity: &KernelIdentity = ctx.identity();
    ctx.responder().reply(
        msg,
        msg_type::KERNEL_INFO_REPLY,
        &KernelInfoReply {
            language: identity.language.clone(),
            language_version: identity.language_version.clone(),
            protocol_version: identity.protocol_version.clone(),
        },
    )
}

#[instrument(skip_all, fields(session = %msg.session(), msg_id = %msg.header.msg_id))]
fn execute(ctx: &KernelContext, msg: &Message) -> Result<()> {
    let code = msg
        .code()
        .ok_or_else(|| KernelError::MalformedMessage(constants::ERR_MISSING_CODE.to_string()))?
        .to_string();

    debug!(code_len = code.len(), "Submitting execution task");
    let task = ExecutionTask::new(code, msg.clone(), ctx.responder().clone());
    ctx.engine().submit(task);
    Ok(())
}

fn shutdown(ctx: &KernelContext, msg: &Message) -> Result<()> {
    let restart = msg
        .content
        .get("restart")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    info!(restart, "Shutdown requested");
    ctx.responder()
        .reply(msg, msg_type::SHUTDOWN_REPLY, &ShutdownReply { restart })?;
    ctx.request_shutdown();
    Ok(())
}
