//! # Kernel Service
//!
//! Request handling on top of the codec and transport layers.
//!
//! ## Components
//! - **Kernel**: owns endpoints, codec and handlers; runs the request loop
//! - **Orchestrator**: `kernel_info_request`, `execute_request` and
//!   `shutdown_request` handlers plus ordered reply/broadcast emission
//! - **Engine**: the contract an external execution engine implements

pub mod engine;
pub mod kernel;
pub mod orchestrator;

pub use engine::{
    ExecutionEngine, ExecutionError, ExecutionOutcome, ExecutionResult, ExecutionTask, TaskState,
};
pub use kernel::{Disposition, Kernel, KernelContext};
pub use orchestrator::Responder;
