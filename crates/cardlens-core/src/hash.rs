//! Stable hashing helpers for inputs, outputs, and manifests.

use blake3::Hasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn to_hex(&self) -> String {
        // blake3 hex(32b) is 64 hex chars
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write as _;
            let _ = write!(&mut s, "{:02x}", b);
        }
        s
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn hash_bytes(bytes: &[u8]) -> Hash256 {
    let mut h = Hasher::new();
    h.update(bytes);
    let out = h.finalize();
    Hash256(out.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_64_chars_and_stable() {
        let a = hash_bytes(b"cards");
        let b = hash_bytes(b"cards");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
        assert_ne!(a, hash_bytes(b"names"));
    }
}
