//! # Core Wire Components
//!
//! Message authentication and multipart framing.
//!
//! ## Components
//! - **Signer**: keyed MAC over the four signed frames
//! - **Codec**: frame splitting, verification, JSON decoding and signed encoding
//!
//! ## Wire Format
//! ```text
//! [identity]* [<IDS|MSG>] [signature] [header] [parent_header] [metadata] [content] [blob]?
//! ```
//!
//! ## Security
//! - Signatures are checked before any frame is decoded
//! - Tags are compared in constant time
//! - An empty key disables signing and verification

pub mod codec;
pub mod signer;
