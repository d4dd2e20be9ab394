//! Content-addressed result cache.
//!
//! Keys are SHA-256 digests of the input samples plus every request field
//! that influences the output, so a hit is always safe to return. Eviction
//! is arbitrary once the capacity is reached; a miss simply falls through to
//! computation.

use cadenza_core::SampleBuffer;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// SHA-256 digest identifying one computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Incremental builder for a [`ContentHash`].
///
/// Every value is written in a fixed-width little-endian encoding, and
/// strings are length-prefixed, so field boundaries cannot alias.
#[derive(Clone)]
pub struct ContentHasher {
    hasher: Sha256,
}

impl std::fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentHasher").finish_non_exhaustive()
    }
}

impl ContentHasher {
    /// Start a digest; `domain` separates different kinds of computation.
    pub fn new(domain: &str) -> Self {
        let mut hasher = Self {
            hasher: Sha256::new(),
        };
        hasher.write_str(domain);
        hasher
    }

    /// Sample rate, channel count, frame count and every sample's bits.
    pub fn write_buffer(&mut self, buffer: &SampleBuffer) -> &mut Self {
        self.write_f64(buffer.sample_rate());
        self.write_u64(buffer.num_channels() as u64);
        self.write_u64(buffer.len() as u64);
        for channel in buffer.channels() {
            for s in channel {
                self.hasher.update(s.to_le_bytes());
            }
        }
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(value.to_le_bytes());
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.hasher.update([value as u8]);
        self
    }

    pub fn write_str(&mut self, value: &str) -> &mut Self {
        self.write_u64(value.len() as u64);
        self.hasher.update(value.as_bytes());
        self
    }

    pub fn finish(self) -> ContentHash {
        let result = self.hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        ContentHash(hash)
    }
}

/// Bounded concurrent map from [`ContentHash`] to shared results.
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: DashMap<ContentHash, Arc<V>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> ResultCache<V> {
    /// `capacity == 0` disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    pub fn get(&self, key: &ContentHash) -> Option<Arc<V>> {
        if !self.is_enabled() {
            return None;
        }
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: ContentHash, value: Arc<V>) {
        if !self.is_enabled() {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            let victim = self.entries.iter().next().map(|entry| *entry.key());
            if let Some(victim) = victim {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}
