//! RFC 6455 payload masking.
//!
//! The masking key is kept as the four bytes received (or generated) in wire
//! order and indexed modulo 4; no integer byte-order conversion happens
//! anywhere.

/// XOR `data` with `key`, starting `offset` bytes into the key cycle.
///
/// The offset is what keeps partial reads and chunked writes consistent:
/// masking a payload in pieces, passing each piece's absolute position,
/// produces the same bytes as masking it whole. Applying the same call
/// twice restores the original data.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4], offset: u64) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(offset.wrapping_add(i as u64) & 3) as usize];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_rfc_example() {
        let key = [0x37, 0xfa, 0x21, 0x3d];
        let mut data = b"Hello".to_vec();
        apply_mask(&mut data, key, 0);
        assert_eq!(data, [0x7f, 0x9f, 0x4d, 0x51, 0x58]);
    }

    #[test]
    fn test_mask_roundtrip() {
        let key = [0x12, 0x34, 0x56, 0x78];
        let original = b"masking is an involution".to_vec();
        let mut data = original.clone();

        apply_mask(&mut data, key, 0);
        assert_ne!(data, original);

        apply_mask(&mut data, key, 0);
        assert_eq!(data, original);
    }

    #[test]
    fn test_mask_offset_matches_whole() {
        let key = [0xab, 0xcd, 0xef, 0x12];
        let original: Vec<u8> = (0..100u8).collect();

        let mut whole = original.clone();
        apply_mask(&mut whole, key, 0);

        for split in [0, 1, 2, 3, 4, 5, 49, 99, 100] {
            let mut pieces = original.clone();
            let (head, tail) = pieces.split_at_mut(split);
            apply_mask(head, key, 0);
            apply_mask(tail, key, split as u64);
            assert_eq!(pieces, whole, "split at {split}");
        }
    }

    #[test]
    fn test_mask_nonzero_start() {
        let key = [0x11, 0x22, 0x33, 0x44];
        let mut data = vec![0u8; 4];
        apply_mask(&mut data, key, 2);
        assert_eq!(data, [0x33, 0x44, 0x11, 0x22]);
    }

    #[test]
    fn test_mask_empty() {
        let mut data: Vec<u8> = Vec::new();
        apply_mask(&mut data, [0xff; 4], 7);
        assert!(data.is_empty());
    }
}
