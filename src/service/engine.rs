//! Execution engine contract.
//!
//! The kernel hands every `execute_request` to an [`ExecutionEngine`] as an
//! [`ExecutionTask`]. The engine owns sessions, execution counters and the
//! evaluator; it may run the task immediately or on another task, and drives
//! the lifecycle through the task's methods:
//!
//! ```text
//! Submitted --before_run(n)--> BeforeRunSent --after_run()--> Running --complete(result)--> Completed
//! ```
//!
//! `complete` consumes the task, so the terminal continuation runs at most
//! once by construction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{constants, KernelError, Result};
use crate::protocol::message::Message;
use crate::service::orchestrator::Responder;

/// Runs submitted code. Implemented outside this crate.
pub trait ExecutionEngine: Send + Sync {
    /// Take ownership of a task. The engine must eventually call
    /// [`ExecutionTask::complete`] exactly once.
    fn submit(&self, task: ExecutionTask);

    /// Interrupt whatever is running for `session`.
    fn interrupt(&self, _session: &str) -> Result<()> {
        Err(KernelError::Unsupported(
            constants::ERR_INTERRUPT_UNSUPPORTED.to_string(),
        ))
    }
}

/// Exception details of a failed execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionError {
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

impl ExecutionError {
    pub fn new(ename: impl Into<String>, evalue: impl Into<String>, traceback: Vec<String>) -> Self {
        Self {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// MIME type → rendered value
    Success { data: Map<String, Value> },
    Error(ExecutionError),
}

/// Terminal state of one execution attempt in a session
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub execution_count: u32,
    pub outcome: ExecutionOutcome,
}

impl ExecutionResult {
    pub fn success(execution_count: u32, data: Map<String, Value>) -> Self {
        Self {
            execution_count,
            outcome: ExecutionOutcome::Success { data },
        }
    }

    /// Success with a single `text/plain` rendering
    pub fn text(execution_count: u32, text: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("text/plain".to_string(), Value::String(text.into()));
        Self::success(execution_count, data)
    }

    pub fn error(execution_count: u32, error: ExecutionError) -> Self {
        Self {
            execution_count,
            outcome: ExecutionOutcome::Error(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Submitted,
    BeforeRunSent,
    Running,
    Completed,
}

/// One submitted code unit and the request it answers.
pub struct ExecutionTask {
    code: String,
    request: Arc<Message>,
    responder: Responder,
    state: TaskState,
}

impl std::fmt::Debug for ExecutionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTask")
            .field("session", &self.session())
            .field("msg_id", &self.request.header.msg_id)
            .field("state", &self.state)
            .finish()
    }
}

impl ExecutionTask {
    pub(crate) fn new(code: String, request: Message, responder: Responder) -> Self {
        Self {
            code,
            request: Arc::new(request),
            responder,
            state: TaskState::Submitted,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    /// Session id from the request header
    pub fn session(&self) -> &str {
        self.request.session()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The request this task answers
    pub fn request(&self) -> &Message {
        &self.request
    }

    /// Announce the code about to run as execution `execution_count`.
    ///
    /// Broadcasts the input echo. Repeated calls are ignored.
    pub fn before_run(&mut self, execution_count: u32) -> Result<()> {
        if self.state != TaskState::Submitted {
            warn!(state = ?self.state, "before_run called out of order, ignoring");
            return Ok(());
        }
        self.state = TaskState::BeforeRunSent;
        self.responder
            .input_echo(&self.request, execution_count, &self.code)
    }

    /// Cleanup hook after the code ran. Emits nothing.
    pub fn after_run(&mut self) {
        match self.state {
            TaskState::Submitted | TaskState::BeforeRunSent => self.state = TaskState::Running,
            state => warn!(?state, "after_run called twice, ignoring"),
        }
    }

    /// Emit the reply and broadcast for `result`, consuming the task.
    pub fn complete(mut self, result: ExecutionResult) -> Result<()> {
        if self.state == TaskState::Submitted {
            debug!("Task completed without before_run");
        }
        self.state = TaskState::Completed;
        self.responder.execution_finished(&self.request, &result)
    }
}

impl Drop for ExecutionTask {
    fn drop(&mut self) {
        if self.state != TaskState::Completed {
            warn!(
                msg_id = %self.request.header.msg_id,
                state = ?self.state,
                "Execution task dropped without completion, no reply will be sent"
            );
        }
    }
}
