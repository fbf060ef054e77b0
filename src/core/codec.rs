//! Multipart wire codec.
//!
//! ```text
//! [identity]* <IDS|MSG> signature header parent_header metadata content [blob]
//! ```
//!
//! Parsing splits the frames, checks the signature over the four signed
//! frames, and only then decodes JSON. A message that fails authentication is
//! never handed to the JSON decoder.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::trace;

use crate::core::signer::Signer;
use crate::error::{constants, KernelError, Result};
use crate::protocol::message::{Header, Message};
use crate::transport::{Frames, Outbox};

/// Sentinel frame separating routing identities from the signed part
pub const DELIMITER: &[u8] = b"<IDS|MSG>";

/// Metadata sent on every outgoing message
const EMPTY_METADATA: &str = "{}";

/// A split but undecoded wire message.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    pub identities: Vec<Bytes>,
    pub signature: Bytes,
    pub header: Bytes,
    pub parent_header: Bytes,
    pub metadata: Bytes,
    pub content: Bytes,
    pub blob: Option<Bytes>,
    /// Set by [`MessageCodec::authenticate`]
    pub authenticated: bool,
}

impl RawMessage {
    /// Split frames at the first delimiter. Does not look inside any frame.
    pub fn split(mut frames: Frames) -> Result<Self> {
        let delim = frames
            .iter()
            .position(|f| f[..] == *DELIMITER)
            .ok_or_else(|| KernelError::MalformedMessage(constants::ERR_MISSING_DELIMITER.into()))?;

        if frames.len() < delim + 6 {
            return Err(KernelError::MalformedMessage(
                constants::ERR_TRUNCATED_MESSAGE.into(),
            ));
        }

        let mut signed = frames.split_off(delim).into_iter().skip(1);
        let identities = frames;

        // Length checked above, so the five signed frames are present.
        let mut next = || signed.next().unwrap_or_default();
        let signature = next();
        let header = next();
        let parent_header = next();
        let metadata = next();
        let content = next();
        let blob = signed.next();

        Ok(Self {
            identities,
            signature,
            header,
            parent_header,
            metadata,
            content,
            blob,
            authenticated: false,
        })
    }

    /// The frames covered by the signature, in signing order
    pub fn signed_parts(&self) -> [&[u8]; 4] {
        [
            &self.header[..],
            &self.parent_header[..],
            &self.metadata[..],
            &self.content[..],
        ]
    }

    /// Decode the JSON frames of an authenticated message.
    pub fn decode(self) -> Result<Message> {
        if !self.authenticated {
            return Err(KernelError::AuthenticationFailed);
        }

        let raw_header: Map<String, Value> = serde_json::from_slice(&self.header)
            .map_err(|e| KernelError::MalformedMessage(format!("header: {e}")))?;
        let header: Header = serde_json::from_value(Value::Object(raw_header.clone()))
            .map_err(|e| KernelError::MalformedMessage(format!("header: {e}")))?;
        let parent_header: Map<String, Value> = serde_json::from_slice(&self.parent_header)
            .map_err(|e| KernelError::MalformedMessage(format!("parent_header: {e}")))?;
        let content: Value = serde_json::from_slice(&self.content)
            .map_err(|e| KernelError::MalformedMessage(format!("content: {e}")))?;

        Ok(Message {
            identities: self.identities,
            header,
            raw_header,
            parent_header,
            metadata: String::from_utf8_lossy(&self.metadata).into_owned(),
            content,
            blob: self.blob,
        })
    }
}

/// Parses, signs and emits wire messages with one shared key.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    signer: Signer,
}

impl MessageCodec {
    pub fn new(signer: Signer) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Recompute the tag and record the result on `raw`.
    pub fn authenticate(&self, raw: &mut RawMessage) -> bool {
        raw.authenticated = self.signer.verify(&raw.signature, raw.signed_parts());
        raw.authenticated
    }

    /// Split, authenticate and decode a multipart message.
    ///
    /// Fails with [`KernelError::AuthenticationFailed`] before decoding
    /// anything when the signature does not match.
    pub fn parse(&self, frames: Frames) -> Result<Message> {
        let mut raw = RawMessage::split(frames)?;
        if !self.authenticate(&mut raw) {
            return Err(KernelError::AuthenticationFailed);
        }
        raw.decode()
    }

    /// Serialize and sign a message into its wire frames.
    ///
    /// `parent_header` is serialized as given, normally the raw header of the
    /// message being answered.
    pub fn encode<P, C>(
        &self,
        identities: &[Bytes],
        header: &Header,
        parent_header: &P,
        content: &C,
    ) -> Result<Frames>
    where
        P: Serialize + ?Sized,
        C: Serialize + ?Sized,
    {
        let header = serde_json::to_string(header)?;
        let parent_header = serde_json::to_string(parent_header)?;
        let content = serde_json::to_string(content)?;

        let signature = self
            .signer
            .sign([header.as_str(), parent_header.as_str(), EMPTY_METADATA, content.as_str()]);

        let mut frames = Vec::with_capacity(identities.len() + 6);
        frames.extend(identities.iter().cloned());
        frames.push(Bytes::from_static(DELIMITER));
        frames.push(Bytes::from(signature));
        frames.push(Bytes::from(header));
        frames.push(Bytes::from(parent_header));
        frames.push(Bytes::from_static(EMPTY_METADATA.as_bytes()));
        frames.push(Bytes::from(content));
        Ok(frames)
    }

    /// Answer `origin` with a new `msg_type` message on `target`.
    ///
    /// Returns the number of bytes queued. Queue failures propagate.
    pub fn respond<C: Serialize + ?Sized>(
        &self,
        target: &Outbox,
        origin: &Message,
        msg_type: &str,
        content: &C,
    ) -> Result<u64> {
        let header = Header::reply_to(&origin.header, msg_type);
        let frames = self.encode(&origin.identities, &header, &origin.raw_header, content)?;
        let len = crate::transport::frames_len(&frames);
        trace!(endpoint = target.name(), msg_type, msg_id = %header.msg_id, "Queueing message");
        target.send(frames)?;
        Ok(len)
    }
}
