//! XOR payload masking (RFC 6455 §5.3).
//!
//! The operation is its own inverse: masking and unmasking are the same
//! byte-for-byte XOR against a rotating 4-byte key. In the client role this
//! crate only ever masks outgoing frames and unmasks incoming ones, but the
//! function itself doesn't care which direction it's used for.

/// XOR `payload` with `key`, rotating the key every 4 bytes.
pub fn apply_mask(payload: &[u8], key: [u8; 4]) -> Vec<u8> {
    payload
        .iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % 4])
        .collect()
}

/// Mask `payload` in place, avoiding an extra allocation on the receive path.
pub fn apply_mask_in_place(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_is_involutive() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let payloads: &[&[u8]] = &[
            b"",
            b"a",
            b"Hello",
            b"exactly8",
            &[0u8; 17],
            &[0xff; 3],
        ];
        for &p in payloads {
            let masked = apply_mask(p, key);
            let unmasked = apply_mask(&masked, key);
            assert_eq!(unmasked, p);
        }
    }

    #[test]
    fn in_place_matches_allocating_version() {
        let key = [1, 2, 3, 4];
        let data = b"some payload bytes".to_vec();
        let allocated = apply_mask(&data, key);
        let mut in_place = data.clone();
        apply_mask_in_place(&mut in_place, key);
        assert_eq!(allocated, in_place);
    }

    #[test]
    fn known_vector() {
        // "Hello" masked with key 0x00000000 is unchanged.
        assert_eq!(apply_mask(b"Hello", [0, 0, 0, 0]), b"Hello");
    }
}
