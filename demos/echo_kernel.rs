//! Example: a kernel that echoes submitted code back as its result
//!
//! Binds the endpoints described by a connection file and serves until
//! Ctrl+C or a `shutdown_request`.
//!
//! Run with: `cargo run --example echo_kernel -- /path/to/kernel.json`

use kernel_protocol::config::KernelConfig;
use kernel_protocol::error::KernelError;
use kernel_protocol::service::{ExecutionEngine, ExecutionResult, ExecutionTask, Kernel};
use kernel_protocol::utils::logging::init_logging;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Echoes code, keeping one execution counter per session.
#[derive(Default)]
struct EchoEngine {
    counters: Mutex<HashMap<String, u32>>,
}

impl EchoEngine {
    fn next_count(&self, session: &str) -> u32 {
        let mut counters = match self.counters.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let counter = counters.entry(session.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }
}

impl ExecutionEngine for EchoEngine {
    fn submit(&self, mut task: ExecutionTask) {
        let count = self.next_count(task.session());
        if let Err(e) = task.before_run(count) {
            warn!(error = %e, "Input echo failed");
        }
        let code = task.code().to_string();
        task.after_run();
        if let Err(e) = task.complete(ExecutionResult::text(count, code)) {
            warn!(error = %e, "Reply failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), KernelError> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => KernelConfig::with_connection_file(path)?,
        None => KernelConfig::default(),
    };
    config.apply_env();
    init_logging(&config.logging)?;

    let kernel = Kernel::start(&config, Arc::new(EchoEngine::default())).await?;
    if let Some(endpoints) = kernel.endpoints() {
        info!(?endpoints, "Echo kernel ready");
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    kernel.run_with_shutdown(shutdown_rx).await
}
