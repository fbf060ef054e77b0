//! # kernel-protocol
//!
//! Transport and message layer for interactive-computing kernels.
//!
//! A kernel listens on three endpoints, authenticates every request with a
//! keyed MAC, routes it by message type, and answers with signed replies and
//! broadcasts. Running the submitted code is delegated to an
//! [`ExecutionEngine`](service::ExecutionEngine) supplied by the host.
//!
//! ## Layers
//! - [`core`]: signing and multipart wire codec
//! - [`protocol`]: message types and the dispatcher
//! - [`transport`]: ZeroMQ endpoints and in-memory doubles
//! - [`service`]: the kernel loop and execution orchestration
//! - [`config`], [`error`], [`utils`]: ambient concerns
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use kernel_protocol::config::KernelConfig;
//! use kernel_protocol::service::{ExecutionEngine, ExecutionResult, ExecutionTask, Kernel};
//!
//! struct Echo;
//!
//! impl ExecutionEngine for Echo {
//!     fn submit(&self, mut task: ExecutionTask) {
//!         let _ = task.before_run(1);
//!         let code = task.code().to_string();
//!         task.after_run();
//!         let _ = task.complete(ExecutionResult::text(1, code));
//!     }
//! }
//!
//! # async fn demo() -> kernel_protocol::error::Result<()> {
//! let config = KernelConfig::with_connection_file("kernel.json")?;
//! let kernel = Kernel::start(&config, Arc::new(Echo)).await?;
//! kernel.run().await
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;
