//! Structured protocol messages and the content payloads the kernel produces.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message type tags consumed and produced by the kernel.
pub mod msg_type {
    pub const KERNEL_INFO_REQUEST: &str = "kernel_info_request";
    pub const KERNEL_INFO_REPLY: &str = "kernel_info_reply";
    pub const EXECUTE_REQUEST: &str = "execute_request";
    pub const EXECUTE_REPLY: &str = "execute_reply";
    pub const SHUTDOWN_REQUEST: &str = "shutdown_request";
    pub const SHUTDOWN_REPLY: &str = "shutdown_reply";

    /// Broadcast echoing submitted code before it runs
    pub const INPUT_ECHO: &str = "pyin";
    /// Broadcast carrying a displayable execution result
    pub const OUTPUT: &str = "pyout";
    /// Broadcast carrying an execution error
    pub const ERROR: &str = "pyerr";
}

/// Message header. Fields the kernel does not interpret are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub msg_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub session: String,
    pub msg_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    /// Fresh header for a message answering `parent`.
    pub fn reply_to(parent: &Header, msg_type: &str) -> Self {
        Self {
            msg_id: uuid::Uuid::new_v4().to_string(),
            username: parent.username.clone(),
            session: parent.session.clone(),
            msg_type: msg_type.to_string(),
            extra: Map::new(),
        }
    }
}

/// An authenticated, decoded protocol message.
///
/// Only the codec constructs these from wire frames, and only after the
/// signature checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub identities: Vec<Bytes>,
    pub header: Header,
    /// Header object exactly as received, echoed as the parent of responses
    pub raw_header: Map<String, Value>,
    pub parent_header: Map<String, Value>,
    /// Opaque metadata frame, never parsed
    pub metadata: String,
    pub content: Value,
    pub blob: Option<Bytes>,
}

impl Message {
    pub fn msg_type(&self) -> &str {
        &self.header.msg_type
    }

    pub fn session(&self) -> &str {
        &self.header.session
    }

    /// `content.code` of an `execute_request`
    pub fn code(&self) -> Option<&str> {
        self.content.get("code").and_then(Value::as_str)
    }
}

/// Fixed identity advertised in `kernel_info_reply`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelInfoReply {
    pub language: String,
    pub language_version: Vec<u32>,
    pub protocol_version: Vec<u32>,
}

/// Status field of `execute_reply`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteReplyOk {
    pub status: ReplyStatus,
    pub execution_count: u32,
    pub payload: Vec<Value>,
    pub user_variables: Map<String, Value>,
    pub user_expressions: Map<String, Value>,
}

impl ExecuteReplyOk {
    pub fn new(execution_count: u32) -> Self {
        Self {
            status: ReplyStatus::Ok,
            execution_count,
            payload: Vec::new(),
            user_variables: Map::new(),
            user_expressions: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecuteReplyError {
    pub status: ReplyStatus,
    pub execution_count: u32,
    pub ename: String,
    pub evalue: String,
    pub traceback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputEcho<'a> {
    pub execution_count: u32,
    pub code: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputBroadcast<'a> {
    pub execution_count: u32,
    pub data: &'a Map<String, Value>,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBroadcast<'a> {
    pub execution_count: u32,
    pub ename: &'a str,
    pub evalue: &'a str,
    pub traceback: &'a [String],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownReply {
    pub restart: bool,
}
