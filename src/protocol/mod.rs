//! # Protocol Layer
//!
//! Structured messages and request routing.
//!
//! ## Components
//! - **Message**: decoded headers and content, plus the payloads the kernel emits
//! - **Dispatcher**: `msg_type` → handler routing with registration-time checks
//!
//! Messages reach this layer only after the codec has verified their signature.

pub mod dispatcher;
pub mod message;
