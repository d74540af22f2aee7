//! Inner-body obfuscation used by Notify frames that wrap a named payload.
//!
//! The scheme XORs every byte with a value derived from its position, the
//! payload length, and a fixed 9-byte key schedule. It operates on raw bytes
//! only, so it is agnostic to whatever encoding the payload happens to hold.

const KEYS: [u8; 9] = [0x84, 0x5e, 0x4e, 0x42, 0x39, 0xa2, 0x1f, 0x60, 0x1c];

/// XOR is an involution under this construction: calling it twice on the
/// same input returns the original bytes.
pub fn xor(data: &[u8]) -> Vec<u8> {
    let len = data.len();
    data.iter()
        .enumerate()
        .map(|(i, &b)| {
            let u = (23u32 ^ len as u32).wrapping_add(5 * i as u32) + KEYS[i % KEYS.len()] as u32;
            b ^ (u & 0xFF) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_involution() {
        let data = b"hello liqi".to_vec();
        let obfuscated = xor(&data);
        assert_ne!(obfuscated, data);
        assert_eq!(xor(&obfuscated), data);
    }

    #[test]
    fn empty_input_stays_empty() {
        assert!(xor(&[]).is_empty());
    }
}
