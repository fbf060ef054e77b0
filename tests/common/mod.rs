//! Shared helpers for integration tests: request signing, stub engines and an
//! in-memory kernel harness.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use kernel_protocol::config::KernelIdentity;
use kernel_protocol::core::codec::{MessageCodec, DELIMITER};
use kernel_protocol::core::signer::{SignatureScheme, Signer};
use kernel_protocol::protocol::message::Message;
use kernel_protocol::service::{
    ExecutionEngine, ExecutionError, ExecutionResult, ExecutionTask, Kernel,
};
use kernel_protocol::transport::memory::{self, ClientChannels};
use kernel_protocol::transport::Frames;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub const KEY: &str = "a0436f6c-1916-498b-8eb9-e81ab9368e84";

pub fn signer() -> Signer {
    Signer::new(SignatureScheme::HmacSha256, KEY)
}

/// Build a signed request the way a client would.
pub fn request(signer: &Signer, msg_type: &str, session: &str, content: Value) -> Frames {
    let header = json!({
        "msg_id": uuid::Uuid::new_v4().to_string(),
        "username": "tester",
        "session": session,
        "msg_type": msg_type,
    });
    let parts = [
        header.to_string(),
        "{}".to_string(),
        "{}".to_string(),
        content.to_string(),
    ];
    let signature = signer.sign(&parts);

    let mut frames = vec![
        Bytes::from_static(b"client-1"),
        Bytes::from_static(DELIMITER),
        Bytes::from(signature),
    ];
    frames.extend(parts.into_iter().map(Bytes::from));
    frames
}

/// Decode a message the kernel emitted.
pub fn decode(frames: Frames) -> Message {
    MessageCodec::new(signer())
        .parse(frames)
        .expect("kernel output must verify")
}

/// Decode a batch of emitted messages into `(msg_type, content)` pairs.
pub fn summarize(batch: Vec<Frames>) -> Vec<(String, Value)> {
    batch
        .into_iter()
        .map(decode)
        .map(|m| (m.header.msg_type.clone(), m.content))
        .collect()
}

/// How a stub engine answers a piece of code
#[derive(Clone)]
pub enum Script {
    Text(String),
    Fail(ExecutionError),
}

/// Runs each task immediately with a per-session counter.
pub struct ImmediateEngine {
    script: Box<dyn Fn(&str) -> Script + Send + Sync>,
    counters: Mutex<HashMap<String, u32>>,
}

impl ImmediateEngine {
    pub fn new(script: impl Fn(&str) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script: Box::new(script),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn succeeding(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Script::Text(text.clone()))
    }

    pub fn failing(error: ExecutionError) -> Self {
        Self::new(move |_| Script::Fail(error.clone()))
    }
}

fn run_task(mut task: ExecutionTask, count: u32, script: Script) {
    task.before_run(count).unwrap();
    task.after_run();
    let result = match script {
        Script::Text(text) => ExecutionResult::text(count, text),
        Script::Fail(error) => ExecutionResult::error(count, error),
    };
    task.complete(result).unwrap();
}

impl ExecutionEngine for ImmediateEngine {
    fn submit(&self, task: ExecutionTask) {
        let count = {
            let mut counters = self.counters.lock().unwrap();
            let counter = counters.entry(task.session().to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        let script = (self.script)(task.code());
        run_task(task, count, script);
    }
}

/// Queues tasks onto a worker that runs them one at a time, later.
pub struct QueuedEngine {
    queue: mpsc::UnboundedSender<ExecutionTask>,
}

impl QueuedEngine {
    pub fn spawn(script: impl Fn(&str) -> Script + Send + Sync + 'static) -> Self {
        let (queue, mut rx) = mpsc::unbounded_channel::<ExecutionTask>();
        tokio::spawn(async move {
            let mut counters: HashMap<String, u32> = HashMap::new();
            while let Some(task) = rx.recv().await {
                tokio::task::yield_now().await;
                let counter = counters.entry(task.session().to_string()).or_insert(0);
                *counter += 1;
                let count = *counter;
                let outcome = script(task.code());
                run_task(task, count, outcome);
            }
        });
        Self { queue }
    }
}

impl ExecutionEngine for QueuedEngine {
    fn submit(&self, task: ExecutionTask) {
        if let Err(rejected) = self.queue.send(task) {
            // Worker gone: complete anyway so the client still gets an answer.
            let task = rejected.0;
            let _ = task.complete(ExecutionResult::error(
                0,
                ExecutionError::new("EngineStopped", "engine stopped", Vec::new()),
            ));
        }
    }
}

/// Never runs anything; holds tasks so tests can drive them by hand.
#[derive(Default)]
pub struct HoldingEngine {
    pub held: Mutex<Vec<ExecutionTask>>,
}

impl ExecutionEngine for HoldingEngine {
    fn submit(&self, task: ExecutionTask) {
        self.held.lock().unwrap().push(task);
    }
}

pub fn identity() -> KernelIdentity {
    KernelIdentity {
        language: "javascript".into(),
        language_version: vec![20, 11, 0],
        protocol_version: vec![4, 1],
    }
}

/// Kernel over in-memory channels plus the client side
pub fn kernel_with(engine: Arc<dyn ExecutionEngine>) -> (Kernel, ClientChannels) {
    let (channels, client) = memory::pair(16);
    let kernel = Kernel::new(channels, signer(), identity(), engine).unwrap();
    (kernel, client)
}
