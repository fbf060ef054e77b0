//! Observability and Metrics
//!
//! Per-kernel counters for request traffic, drops and emitted messages.
//!
//! Uses atomic counters so emission from engine-owned tasks can record sends
//! without locking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for one kernel instance
#[derive(Debug)]
pub struct Metrics {
    /// Multipart messages received on the request/response endpoint
    pub messages_received: AtomicU64,
    /// Total bytes received on the request/response endpoint
    pub bytes_received: AtomicU64,
    /// Messages dropped for a bad signature
    pub authentication_failures: AtomicU64,
    /// Messages dropped for bad framing or undecodable JSON
    pub malformed_messages: AtomicU64,
    /// Authenticated messages with no registered handler
    pub unsupported_messages: AtomicU64,
    /// Messages handed to a handler
    pub messages_dispatched: AtomicU64,
    /// Handler invocations that returned an error
    pub handler_errors: AtomicU64,
    /// Signed messages queued on any endpoint
    pub messages_sent: AtomicU64,
    /// Total bytes queued on any endpoint
    pub bytes_sent: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            authentication_failures: AtomicU64::new(0),
            malformed_messages: AtomicU64::new(0),
            unsupported_messages: AtomicU64::new(0),
            messages_dispatched: AtomicU64::new(0),
            handler_errors: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a multipart arrival
    pub fn message_received(&self, byte_count: u64) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a signature mismatch
    pub fn authentication_failure(&self) {
        self.authentication_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a malformed message
    pub fn malformed_message(&self) {
        self.malformed_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message type with no handler
    pub fn unsupported_message(&self) {
        self.unsupported_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_dispatched(&self) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_error(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a signed message queued for sending
    pub fn message_sent(&self, byte_count: u64) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            authentication_failures: self.authentication_failures.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
            unsupported_messages: self.unsupported_messages.load(Ordering::Relaxed),
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            messages_received = snapshot.messages_received,
            bytes_received = snapshot.bytes_received,
            authentication_failures = snapshot.authentication_failures,
            malformed_messages = snapshot.malformed_messages,
            unsupported_messages = snapshot.unsupported_messages,
            messages_dispatched = snapshot.messages_dispatched,
            handler_errors = snapshot.handler_errors,
            messages_sent = snapshot.messages_sent,
            bytes_sent = snapshot.bytes_sent,
            uptime_seconds = snapshot.uptime_seconds,
            "Kernel metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub bytes_received: u64,
    pub authentication_failures: u64,
    pub malformed_messages: u64,
    pub unsupported_messages: u64,
    pub messages_dispatched: u64,
    pub handler_errors: u64,
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
