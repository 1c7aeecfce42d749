//! Text-safe encodings for binary blobs and secret names.
//!
//! Blobs (salts, cipher records) are written with the standard base64
//! alphabet so documents stay readable by older builds; decoding accepts
//! either alphabet, padded or not.
//!
//! Secret names are mapped to storage keys with URL-safe base64 without
//! padding.  The transform is deterministic, reversible and collision-free
//! because it is a bijection on UTF-8 byte strings.

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::errors::{Result, VaultError};

/// Encode a binary blob for storage in a document field.
pub fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a blob previously produced by [`encode_blob`] (or by any
/// base64 / base64url encoder).
pub fn decode_blob(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    let engines = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD];
    for engine in engines {
        if let Ok(bytes) = engine.decode(text) {
            return Ok(bytes);
        }
    }
    Err(VaultError::InvalidEncoding("not valid base64".into()))
}

/// Map a logical secret name to its storage-safe identifier.
pub fn encode_name(name: &str) -> String {
    URL_SAFE_NO_PAD.encode(name.as_bytes())
}

/// Reverse [`encode_name`].
///
/// Returns `None` when `encoded` is not a valid encoding of a UTF-8
/// string.  Legacy raw names may still decode by accident, so callers
/// should prefer the `originalName` stored in metadata when present.
pub fn decode_name(encoded: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
    let name = String::from_utf8(bytes).ok()?;
    // Reject non-canonical encodings so decode is the exact inverse.
    (encode_name(&name) == encoded).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_roundtrip_unicode() {
        for name in [
            "github",
            "AWS prod / root",
            "пароль",
            "密码 🔑",
            "a|b=c&d",
            " leading and trailing ",
        ] {
            let encoded = encode_name(name);
            assert!(encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_'));
            assert_eq!(decode_name(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn distinct_names_never_collide() {
        assert_ne!(encode_name("a"), encode_name("b"));
        assert_ne!(encode_name("ab"), encode_name("a b"));
    }

    #[test]
    fn decode_name_rejects_garbage() {
        assert_eq!(decode_name("!!!"), None);
        // Valid base64url but not UTF-8.
        assert_eq!(decode_name("_w"), None);
    }

    #[test]
    fn blob_decoding_accepts_both_alphabets() {
        let bytes = [0xfbu8, 0xff, 0xfe, 0x00, 0x10];
        let standard = encode_blob(&bytes);
        assert_eq!(decode_blob(&standard).unwrap(), bytes);

        let url = URL_SAFE_NO_PAD.encode(bytes);
        assert_eq!(decode_blob(&url).unwrap(), bytes);
    }

    #[test]
    fn blob_decoding_rejects_non_base64() {
        assert!(matches!(
            decode_blob("not base64 at all!"),
            Err(VaultError::InvalidEncoding(_))
        ));
    }
}
