#![no_main]

use bytes::Bytes;
use kernel_protocol::core::codec::MessageCodec;
use kernel_protocol::core::signer::{SignatureScheme, Signer};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|frames: Vec<Vec<u8>>| {
    // Arbitrary multipart input must never panic, signed or not.
    let frames: Vec<Bytes> = frames.into_iter().map(Bytes::from).collect();
    let _ = MessageCodec::new(Signer::new(SignatureScheme::HmacSha256, "fuzz")).parse(frames.clone());
    let _ = MessageCodec::new(Signer::unsigned()).parse(frames);
});
