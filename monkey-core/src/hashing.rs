//! Fixed-width digests over canonical byte streams.

use sha2::{Digest, Sha256};

/// Incremental 64-bit digest: the first eight bytes, little endian, of a
/// SHA-256 over everything written.
///
/// Variable-length fields are length prefixed so adjacent fields cannot
/// collide by shifting bytes between them.
#[derive(Debug, Clone, Default)]
pub struct Hasher64 {
    inner: Sha256,
}

impl Hasher64 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.update(value.to_le_bytes());
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.write_u64(data.len() as u64);
        self.inner.update(data);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn finish(self) -> u64 {
        let out = self.inner.finalize();
        let mut word = [0u8; 8];
        word.copy_from_slice(&out[..8]);
        u64::from_le_bytes(word)
    }
}
