//! Strict UTF-8 validation for text payloads and close reasons.
//!
//! `std::str::from_utf8` already implements the strict decode RFC 6455
//! requires for text payloads: it rejects overlong encodings, lone
//! surrogates, and truncated sequences. This module only adapts its result
//! into the protocol error carrying the close status the peer must be told
//! (1007).

use crate::error::WsError;

/// Validate `bytes` as UTF-8, returning the decoded `&str` on success.
pub fn validate(bytes: &[u8]) -> Result<&str, WsError> {
    std::str::from_utf8(bytes).map_err(|_| WsError::invalid_utf8())
}

/// Validate and take ownership, avoiding a second allocation on the happy path.
pub fn validate_owned(bytes: Vec<u8>) -> Result<String, WsError> {
    String::from_utf8(bytes).map_err(|_| WsError::invalid_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_utf8() {
        assert!(validate("hello".as_bytes()).is_ok());
        assert!(validate("héllo wörld 日本語".as_bytes()).is_ok());
        assert!(validate(&[]).is_ok());
    }

    #[test]
    fn rejects_lone_invalid_byte() {
        assert!(validate(&[0xff]).is_err());
    }

    #[test]
    fn rejects_lone_continuation_byte() {
        assert!(validate(&[0x80]).is_err());
    }

    #[test]
    fn rejects_overlong_encoding() {
        // Overlong encoding of NUL (0x00) as two bytes.
        assert!(validate(&[0xc0, 0x80]).is_err());
    }

    #[test]
    fn rejects_utf16_surrogate_encoded_as_utf8() {
        // U+D800 (a lone high surrogate) encoded via the CESU-8-style
        // 3-byte form; never valid as UTF-8.
        assert!(validate(&[0xed, 0xa0, 0x80]).is_err());
    }

    #[test]
    fn rejects_truncated_sequence() {
        // Leading byte of a 3-byte sequence with nothing following.
        assert!(validate(&[0xe2, 0x82]).is_err());
    }

    #[test]
    fn validate_owned_matches_validate() {
        let v = vec![0xffu8];
        assert!(validate_owned(v).is_err());
        let v = b"ok".to_vec();
        assert_eq!(validate_owned(v).unwrap(), "ok");
    }
}
