use crate::error::{constants, KernelError, Result};
use crate::protocol::message::Message;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

type HandlerFn<C> = dyn Fn(&C, &Message) -> Result<()> + Send + Sync + 'static;

/// What happened to a dispatched message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A handler ran
    Handled,
    /// No handler is registered for the message type
    Unsupported,
}

/// Routes authenticated messages to handlers keyed by `msg_type`.
///
/// `C` is the context every handler receives alongside the message.
/// Handler names are fixed at registration: registering a name twice fails.
pub struct Dispatcher<C> {
    handlers: Arc<RwLock<HashMap<Cow<'static, str>, Box<HandlerFn<C>>>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register<F>(&self, msg_type: impl Into<Cow<'static, str>>, handler: F) -> Result<()>
    where
        F: Fn(&C, &Message) -> Result<()> + Send + Sync + 'static,
    {
        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| KernelError::Custom(constants::ERR_DISPATCHER_WRITE_LOCK.to_string()))?;

        let msg_type = msg_type.into();
        if handlers.contains_key(&msg_type) {
            return Err(KernelError::DuplicateHandler(msg_type.into_owned()));
        }
        handlers.insert(msg_type, Box::new(handler));
        Ok(())
    }

    /// Whether a handler is registered for `msg_type`
    pub fn handles(&self, msg_type: &str) -> bool {
        self.handlers
            .read()
            .map(|handlers| handlers.contains_key(msg_type))
            .unwrap_or(false)
    }

    /// Registered message types, sorted
    pub fn message_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .map(|handlers| handlers.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Run the handler for `msg.header.msg_type`.
    ///
    /// Unknown types are logged and ignored; no reply is produced for them.
    pub fn dispatch(&self, ctx: &C, msg: &Message) -> Result<Dispatched> {
        let handlers = self
            .handlers
            .read()
            .map_err(|_| KernelError::Custom(constants::ERR_DISPATCHER_READ_LOCK.to_string()))?;

        match handlers.get(msg.msg_type()) {
            Some(handler) => {
                handler(ctx, msg)?;
                Ok(Dispatched::Handled)
            }
            None => {
                warn!(msg_type = msg.msg_type(), "Ignoring unsupported request");
                Ok(Dispatched::Unsupported)
            }
        }
    }
}
