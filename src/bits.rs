//! Most-significant-bit-first integer <-> bit-sequence conversions, and the
//! WebSocket payload-length header encoding built on top of them.
//!
//! A real wire implementation packs these straight into bytes with shifts
//! and masks (see [`crate::frame`]); this module exists because the
//! length-header encoding rules are most naturally stated, and tested, in
//! terms of bit counts rather than byte counts (7 bits, then optionally 16
//! or 64 more).

use crate::error::WsError;

/// Encode `v` as the `n` most significant bits, most-significant-bit first.
///
/// `v` must fit in `n` bits; the caller (here, always [`payload_length_to_bits`])
/// is responsible for only requesting widths that can hold the value.
pub fn number_to_bits(v: u64, n: u32) -> Vec<bool> {
    (0..n).map(|i| (v >> (n - 1 - i)) & 1 == 1).collect()
}

/// Decode a most-significant-bit-first bit sequence back into an integer.
pub fn bits_to_number(bits: &[bool]) -> u64 {
    bits.iter().fold(0u64, |acc, &b| (acc << 1) | b as u64)
}

/// Build the payload-length portion of a frame header, per RFC 6455 §5.2.
///
/// Returns the 7-bit field (len<126), 7+16 bits (126<=len<2^16), or 7+64
/// bits (2^16<=len<2^63). Lengths with the high bit of a 64-bit field set
/// are illegal per the RFC and rejected with the protocol-error status
/// (1002) the peer must be told.
pub fn payload_length_to_bits(len: u64) -> Result<Vec<bool>, WsError> {
    if len < 126 {
        Ok(number_to_bits(len, 7))
    } else if len < 1 << 16 {
        let mut bits = number_to_bits(126, 7);
        bits.extend(number_to_bits(len, 16));
        Ok(bits)
    } else if len < 1 << 63 {
        let mut bits = number_to_bits(127, 7);
        bits.extend(number_to_bits(len, 64));
        Ok(bits)
    } else {
        Err(WsError::protocol("payload length exceeds 2^63-1"))
    }
}

/// Pack a bit sequence (length a multiple of 8) into bytes, MSB first per byte.
pub fn bits_to_bytes(bits: &[bool]) -> Vec<u8> {
    debug_assert_eq!(bits.len() % 8, 0);
    bits.chunks(8).map(|chunk| bits_to_number(chunk) as u8).collect()
}
