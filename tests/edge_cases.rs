//! Edge case tests for wire framing and message decoding

#![allow(clippy::expect_used, clippy::unwrap_used)]

use bytes::Bytes;
use kernel_protocol::core::codec::{MessageCodec, RawMessage, DELIMITER};
use kernel_protocol::core::signer::{SignatureScheme, Signer};
use kernel_protocol::error::KernelError;
use kernel_protocol::protocol::message::Header;
use serde_json::{json, Map};

const KEY: &str = "edge-key";

fn codec() -> MessageCodec {
    MessageCodec::new(Signer::new(SignatureScheme::HmacSha256, KEY))
}

fn signed(identities: &[&'static str], parts: [&str; 4], blob: Option<&'static [u8]>) -> Vec<Bytes> {
    let signature = codec().signer().sign(parts);
    let mut frames: Vec<Bytes> = identities.iter().map(|&id| Bytes::from_static(id.as_bytes())).collect();
    frames.push(Bytes::from_static(DELIMITER));
    frames.push(Bytes::from(signature));
    frames.extend(parts.iter().map(|p| Bytes::copy_from_slice(p.as_bytes())));
    frames.extend(blob.map(Bytes::from_static));
    frames
}

const HEADER: &str = r#"{"msg_id":"m1","username":"u","session":"s","msg_type":"kernel_info_request","date":"2014-01-01T00:00:00Z"}"#;

#[test]
fn test_empty_multipart() {
    let result = codec().parse(Vec::new());
    assert!(matches!(result, Err(KernelError::MalformedMessage(_))));
}

#[test]
fn test_delimiter_is_last_frame() {
    let frames = vec![Bytes::from_static(b"id"), Bytes::from_static(DELIMITER)];
    assert!(matches!(
        RawMessage::split(frames),
        Err(KernelError::MalformedMessage(_))
    ));
}

#[test]
fn test_first_delimiter_wins() {
    // A second delimiter after the first is ordinary payload.
    let frames = signed(&["a", "b"], [HEADER, "{}", "{}", "{}"], Some(DELIMITER));
    let msg = codec().parse(frames).unwrap();

    assert_eq!(msg.identities.len(), 2);
    assert_eq!(msg.blob.as_deref(), Some(DELIMITER));
}

#[test]
fn test_frames_beyond_blob_ignored() {
    let mut frames = signed(&["id"], [HEADER, "{}", "{}", "{}"], Some(&b"blob"[..]));
    frames.push(Bytes::from_static(b"trailing"));

    let msg = codec().parse(frames).unwrap();
    assert_eq!(msg.blob, Some(Bytes::from_static(b"blob")));
}

#[test]
fn test_unknown_header_fields_preserved() {
    let msg = codec().parse(signed(&["id"], [HEADER, "{}", "{}", "{}"], None)).unwrap();

    assert_eq!(msg.header.extra.get("date"), Some(&json!("2014-01-01T00:00:00Z")));
    let echoed = serde_json::to_value(&msg.header).unwrap();
    assert_eq!(echoed, serde_json::from_str::<serde_json::Value>(HEADER).unwrap());
}

#[test]
fn test_header_without_session_or_username() {
    let header = r#"{"msg_id":"m2","msg_type":"execute_request"}"#;
    let msg = codec().parse(signed(&[], [header, "{}", "{}", "{}"], None)).unwrap();

    assert_eq!(msg.session(), "");
    assert_eq!(msg.header.username, "");
}

#[test]
fn test_header_missing_msg_type_is_malformed() {
    let header = r#"{"msg_id":"m3"}"#;
    let result = codec().parse(signed(&[], [header, "{}", "{}", "{}"], None));
    assert!(matches!(result, Err(KernelError::MalformedMessage(m)) if m.starts_with("header")));
}

#[test]
fn test_metadata_never_parsed() {
    let msg = codec()
        .parse(signed(&["id"], [HEADER, "{}", "not json at all", "{}"], None))
        .unwrap();
    assert_eq!(msg.metadata, "not json at all");
}

#[test]
fn test_parent_header_must_be_object() {
    let result = codec().parse(signed(&["id"], [HEADER, "[]", "{}", "{}"], None));
    assert!(matches!(result, Err(KernelError::MalformedMessage(m)) if m.starts_with("parent_header")));
}

#[test]
fn test_signature_of_wrong_scheme_rejected() {
    let parts = [HEADER, "{}", "{}", "{}"];
    let sha512 = Signer::new(SignatureScheme::HmacSha512, KEY).sign(parts);

    let mut frames = signed(&["id"], parts, None);
    frames[2] = Bytes::from(sha512);
    assert!(matches!(
        codec().parse(frames),
        Err(KernelError::AuthenticationFailed)
    ));
}

#[test]
fn test_truncated_signature_rejected() {
    let mut frames = signed(&["id"], [HEADER, "{}", "{}", "{}"], None);
    frames[2] = frames[2].slice(..32);
    assert!(matches!(
        codec().parse(frames),
        Err(KernelError::AuthenticationFailed)
    ));
}

#[test]
fn test_empty_signature_rejected_when_signing() {
    let mut frames = signed(&["id"], [HEADER, "{}", "{}", "{}"], None);
    frames[2] = Bytes::new();
    assert!(matches!(
        codec().parse(frames),
        Err(KernelError::AuthenticationFailed)
    ));
}

#[test]
fn test_encode_without_identities() {
    let parent: Header = serde_json::from_str(HEADER).unwrap();
    let header = Header::reply_to(&parent, "kernel_info_reply");

    let frames = codec().encode(&[], &header, &parent, &json!({"a": 1})).unwrap();
    assert_eq!(frames.len(), 6);
    assert_eq!(&frames[0][..], DELIMITER);

    let decoded = codec().parse(frames).unwrap();
    assert!(decoded.identities.is_empty());
    assert_eq!(decoded.header, header);
    assert_eq!(decoded.parent_header.get("msg_id"), Some(&json!("m1")));
    assert_eq!(decoded.parent_header.get("date"), Some(&json!("2014-01-01T00:00:00Z")));
}

#[test]
fn test_reply_headers_are_fresh() {
    let parent: Header = serde_json::from_str(HEADER).unwrap();
    let a = Header::reply_to(&parent, "x");
    let b = Header::reply_to(&parent, "x");

    assert_ne!(a.msg_id, b.msg_id);
    assert_ne!(a.msg_id, parent.msg_id);
    assert_eq!(a.session, "s");
    assert_eq!(a.extra, Map::new());
}
