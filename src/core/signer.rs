//! Keyed message authentication for the signed part of a wire message.
//!
//! The tag covers header, parent header, metadata and content, fed into the
//! MAC in that order, and travels as lowercase hex. An empty key selects
//! unsigned mode: tags are empty and every message verifies.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

use crate::error::{KernelError, Result};

type HmacSha256 = Hmac<Sha256>;
type HmacSha384 = Hmac<Sha384>;
type HmacSha512 = Hmac<Sha512>;

/// Default scheme named in connection files
pub const DEFAULT_SIGNATURE_SCHEME: &str = "hmac-sha256";

/// Supported MAC algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureScheme {
    #[default]
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl SignatureScheme {
    /// Scheme name as it appears in connection files
    pub fn name(self) -> &'static str {
        match self {
            SignatureScheme::HmacSha256 => "hmac-sha256",
            SignatureScheme::HmacSha384 => "hmac-sha384",
            SignatureScheme::HmacSha512 => "hmac-sha512",
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = KernelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hmac-sha256" => Ok(SignatureScheme::HmacSha256),
            "hmac-sha384" => Ok(SignatureScheme::HmacSha384),
            "hmac-sha512" => Ok(SignatureScheme::HmacSha512),
            other => Err(KernelError::UnsupportedScheme(other.to_string())),
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Signs and verifies the four signed frames of a message.
#[derive(Clone)]
pub struct Signer {
    scheme: SignatureScheme,
    key: Vec<u8>,
}

// Keep the key out of logs.
impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("scheme", &self.scheme)
            .field("unsigned", &self.is_unsigned())
            .finish()
    }
}

impl Signer {
    pub fn new(scheme: SignatureScheme, key: impl Into<Vec<u8>>) -> Self {
        Self {
            scheme,
            key: key.into(),
        }
    }

    /// Build a signer from the textual scheme name and key of a connection descriptor
    pub fn from_config(scheme: &str, key: &str) -> Result<Self> {
        Ok(Self::new(scheme.parse()?, key.as_bytes()))
    }

    /// Signer that neither produces nor checks tags
    pub fn unsigned() -> Self {
        Self::new(SignatureScheme::default(), Vec::new())
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    pub fn is_unsigned(&self) -> bool {
        self.key.is_empty()
    }

    /// Compute the lowercase hex tag over `parts`, in order.
    pub fn sign<I, P>(&self, parts: I) -> String
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        if self.is_unsigned() {
            return String::new();
        }
        hex::encode(self.digest(parts))
    }

    /// Check `signature` against the tag recomputed over `parts`.
    ///
    /// Matches exact lowercase-hex equality, compared in constant time.
    pub fn verify<I, P>(&self, signature: &[u8], parts: I) -> bool
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        if self.is_unsigned() {
            return true;
        }
        if signature.iter().any(u8::is_ascii_uppercase) {
            return false;
        }
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };

        macro_rules! check {
            ($mac:ty) => {{
                let Ok(mut mac) = <$mac as Mac>::new_from_slice(&self.key) else {
                    return false;
                };
                for part in parts {
                    mac.update(part.as_ref());
                }
                mac.verify_slice(&tag).is_ok()
            }};
        }

        match self.scheme {
            SignatureScheme::HmacSha256 => check!(HmacSha256),
            SignatureScheme::HmacSha384 => check!(HmacSha384),
            SignatureScheme::HmacSha512 => check!(HmacSha512),
        }
    }

    fn digest<I, P>(&self, parts: I) -> Vec<u8>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        macro_rules! run {
            ($mac:ty) => {{
                // HMAC accepts keys of any length, so this cannot fail.
                let Ok(mut mac) = <$mac as Mac>::new_from_slice(&self.key) else {
                    return Vec::new();
                };
                for part in parts {
                    mac.update(part.as_ref());
                }
                mac.finalize().into_bytes().to_vec()
            }};
        }

        match self.scheme {
            SignatureScheme::HmacSha256 => run!(HmacSha256),
            SignatureScheme::HmacSha384 => run!(HmacSha384),
            SignatureScheme::HmacSha512 => run!(HmacSha512),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARTS: [&str; 4] = [
        r#"{"msg_id":"1","username":"u","session":"s","msg_type":"kernel_info_request"}"#,
        "{}",
        "{}",
        "{}",
    ];

    #[test]
    fn test_scheme_names() {
        for scheme in [
            SignatureScheme::HmacSha256,
            SignatureScheme::HmacSha384,
            SignatureScheme::HmacSha512,
        ] {
            assert_eq!(scheme.name().parse::<SignatureScheme>().ok(), Some(scheme));
        }
        assert!(matches!(
            "hmac-md5".parse::<SignatureScheme>(),
            Err(KernelError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_known_sha256_vector() {
        // RFC 4231 test case 2
        let signer = Signer::new(SignatureScheme::HmacSha256, "Jefe");
        assert_eq!(
            signer.sign(["what do ya want ", "for nothing?"]),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_tag_length_follows_scheme() {
        let key = "secret";
        assert_eq!(Signer::new(SignatureScheme::HmacSha256, key).sign(PARTS).len(), 64);
        assert_eq!(Signer::new(SignatureScheme::HmacSha384, key).sign(PARTS).len(), 96);
        assert_eq!(Signer::new(SignatureScheme::HmacSha512, key).sign(PARTS).len(), 128);
    }

    #[test]
    fn test_verify_accepts_own_tag() {
        let signer = Signer::new(SignatureScheme::HmacSha512, "k");
        let tag = signer.sign(PARTS);
        assert!(signer.verify(tag.as_bytes(), PARTS));
    }

    #[test]
    fn test_verify_rejects_uppercase_and_garbage() {
        let signer = Signer::new(SignatureScheme::HmacSha256, "k");
        let tag = signer.sign(PARTS);
        assert!(!signer.verify(tag.to_uppercase().as_bytes(), PARTS));
        assert!(!signer.verify(b"not hex", PARTS));
        assert!(!signer.verify(b"", PARTS));
    }

    #[test]
    fn test_verify_rejects_other_key() {
        let tag = Signer::new(SignatureScheme::HmacSha256, "a").sign(PARTS);
        assert!(!Signer::new(SignatureScheme::HmacSha256, "b").verify(tag.as_bytes(), PARTS));
    }

    #[test]
    fn test_unsigned_mode() {
        let signer = Signer::unsigned();
        assert!(signer.is_unsigned());
        assert_eq!(signer.sign(PARTS), "");
        assert!(signer.verify(b"anything at all", PARTS));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = Signer::new(SignatureScheme::HmacSha256, "top-secret");
        assert!(!format!("{signer:?}").contains("top-secret"));
    }
}
