//! Persistent bridge cache, one file per cluster pair.
//!
//! Key: SHA-256 hex of `"<signature A>-<signature B>"`. Value: the JSON
//! array of accepted candidates for that pair. Entries never expire; they
//! are only removed by [`BridgeCache::clear`].

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::bridge::candidate::BridgeCandidate;
use crate::storage::StorageManager;

/// Cache key for an ordered pair of cluster signatures.
pub fn pair_key(signature_a: &str, signature_b: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature_a.as_bytes());
    hasher.update(b"-");
    hasher.update(signature_b.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn file_name(key: &str) -> String {
    format!("{key}.json")
}

pub struct BridgeCache {
    store: Arc<dyn StorageManager>,
}

impl BridgeCache {
    pub fn new(store: Arc<dyn StorageManager>) -> Self {
        Self { store }
    }

    /// Cached candidates for `key`. Unreadable entries count as misses.
    pub fn get(&self, key: &str) -> Option<Vec<BridgeCandidate>> {
        let name = file_name(key);
        if !self.store.exists(&name) {
            return None;
        }

        let bytes = match self.store.read(&name) {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("bridge cache read failed for {key}: {err}");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(candidates) => Some(candidates),
            Err(err) => {
                log::warn!("bridge cache entry {key} is corrupt, ignoring: {err}");
                None
            }
        }
    }

    pub fn put(&self, key: &str, candidates: &[BridgeCandidate]) -> std::io::Result<()> {
        let bytes = serde_json::to_vec(candidates)?;
        self.store.write(&file_name(key), &bytes)
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    fn keys(&self) -> Vec<String> {
        self.store
            .list()
            .into_iter()
            .filter_map(|name| name.strip_suffix(".json").map(str::to_string))
            .collect()
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> std::io::Result<usize> {
        let keys = self.keys();
        for key in &keys {
            self.store.delete(&file_name(key))?;
        }
        Ok(keys.len())
    }
}
