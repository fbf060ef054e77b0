//! # Error Types
//!
//! Error handling for the kernel message layer.
//!
//! This module defines all error variants that can occur while binding endpoints,
//! parsing and signing wire messages, dispatching requests and talking to the
//! execution engine.
//!
//! ## Error Categories
//! - **I/O Errors**: Socket and file system failures
//! - **Wire Errors**: Bad framing, bad signatures, undecodable JSON
//! - **Transport Errors**: Bind failures and closed endpoint queues
//! - **Configuration Errors**: Invalid connection descriptors or kernel identity
//!
//! Authentication and malformed-message errors never reach a client: the kernel
//! drops the offending request and only records the failure locally.
//!
//! ## Example Usage
//! ```rust
//! use kernel_protocol::error::{KernelError, Result};
//! use tracing::{error, info};
//!
//! fn parse_port(raw: &str) -> Result<u16> {
//!     raw.parse::<u16>()
//!         .map_err(|e| KernelError::ConfigError(format!("bad port {raw}: {e}")))
//! }
//!
//! fn main() {
//!     match parse_port("5555") {
//!         Ok(port) => info!(port, "Port accepted"),
//!         Err(e) => error!(error = %e, "Port rejected"),
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Wire framing errors
    pub const ERR_MISSING_DELIMITER: &str = "Missing <IDS|MSG> delimiter";
    pub const ERR_TRUNCATED_MESSAGE: &str = "Too few frames after delimiter";

    /// Endpoint errors
    pub const ERR_ENDPOINT_CLOSED: &str = "Endpoint queue closed";
    pub const ERR_EMPTY_MULTIPART: &str = "Refusing to send an empty multipart message";

    /// Execution errors
    pub const ERR_MISSING_CODE: &str = "execute_request without string content.code";
    pub const ERR_INTERRUPT_UNSUPPORTED: &str = "Execution engine does not support interruption";
}

// KernelError is the primary error type for all kernel operations
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Failed to bind {endpoint}: {reason}")]
    BindError { endpoint: String, reason: String },

    #[error("Endpoint closed")]
    ConnectionClosed,

    #[error("Message failed authentication")]
    AuthenticationFailed,

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Unsupported signature scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Handler already registered for {0}")]
    DuplicateHandler(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl From<zeromq::ZmqError> for KernelError {
    fn from(err: zeromq::ZmqError) -> Self {
        KernelError::TransportError(err.to_string())
    }
}

/// Type alias for Results using KernelError
pub type Result<T> = std::result::Result<T, KernelError>;
