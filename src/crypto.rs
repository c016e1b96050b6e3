//! Routines for generating high-entropy test payloads.

use rand::prelude::*;
use rand::rngs::OsRng;
use rand_chacha::ChaCha8Rng;

/// Size of every payload block except possibly the last one of a file.
pub(crate) const BLOCK_SIZE: usize = 1024 * 1024;

/// Secret key that all payloads of a single run are derived from.
#[derive(Clone)]
pub(crate) struct PayloadKey([u8; blake3::KEY_LEN]);

impl PayloadKey {
    /// Draws a fresh key from the operating system's CSPRNG.
    pub(crate) fn random() -> Self {
        let mut key = [0; blake3::KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Derives a key from a seed, for reproducible runs.
    pub(crate) fn from_seed(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut key = [0; blake3::KEY_LEN];
        rng.fill_bytes(&mut key);
        Self(key)
    }
}

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey(..)")
    }
}

/// The content of one test file, produced one block at a time.
///
/// Block `n` of file `ordinal` is the keyed blake3 output stream of
/// `(ordinal, n)`, so no two files of a run share content and nothing
/// larger than a single block is ever held in memory. The sequence is
/// consumed once; build a new `Payload` to regenerate it.
pub(crate) struct Payload {
    hasher: blake3::Hasher,
    ordinal: u64,
    block: u64,
    remaining: u64,
}

impl Payload {
    pub(crate) fn new(key: &PayloadKey, ordinal: u64, total_bytes: u64) -> Self {
        Self {
            hasher: blake3::Hasher::new_keyed(&key.0),
            ordinal,
            block: 0,
            remaining: total_bytes,
        }
    }
}

impl Iterator for Payload {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Vec<u8>> {
        if self.remaining == 0 {
            return None;
        }
        let length = self.remaining.min(BLOCK_SIZE as u64) as usize;
        let mut chunk = vec![0; length];
        self.hasher.update(&self.ordinal.to_le_bytes());
        self.hasher.update(&self.block.to_le_bytes());
        self.hasher.finalize_xof().fill(&mut chunk);
        self.hasher.reset();
        self.block += 1;
        self.remaining -= length as u64;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let blocks = self.remaining.div_ceil(BLOCK_SIZE as u64) as usize;
        (blocks, Some(blocks))
    }
}

impl ExactSizeIterator for Payload {}
