//! Keyed-hash integrity tag for management packets.
//!
//! The construction is fixed for interoperability: render the byte list as a
//! space-separated decimal string, append the ASCII secret key, take the
//! SHA-256 digest, and keep its first 8 bits as the tag. Packet headers only
//! have room for one byte; the truncation is the space/assurance tradeoff
//! the frame format mandates.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Compute the 8-bit tag over `bytes` with `key`.
pub fn tag(bytes: &[u8], key: &str) -> u8 {
    let mut input = String::new();
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            input.push(' ');
        }
        let _ = write!(input, "{byte}");
    }
    input.push_str(key);
    Sha256::digest(input.as_bytes())[0]
}

/// Byte-equal comparison against the expected tag.
pub fn verify(bytes: &[u8], key: &str, expected: u8) -> bool {
    tag(bytes, key) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_is_deterministic() {
        let data = [3, 5, 0, 7, 2, 1, 4];
        assert_eq!(tag(&data, "12345"), tag(&data, "12345"));
    }

    #[test]
    fn verify_accepts_matching_tag() {
        let data = [3, 0, 0, 7, 2, 1, 4];
        let t = tag(&data, "12345");
        assert!(verify(&data, "12345", t));
    }

    #[test]
    fn verify_rejects_flipped_tag() {
        let data = [3, 0, 0, 7, 2, 1, 4];
        let t = tag(&data, "12345");
        assert!(!verify(&data, "12345", t ^ 0xFF));
    }

    #[test]
    fn empty_byte_list_hashes_only_the_key() {
        assert_eq!(tag(&[], "12345"), Sha256::digest(b"12345")[0]);
    }
}
