//! JSON persistence for the embedding index.
//!
//! File format: `embeddings-cache.json`, one object mapping note id to an
//! array of floats. Always read and written as a whole.

use std::collections::HashMap;
use std::sync::Arc;

use crate::semantic::index::VectorIndex;
use crate::storage::StorageManager;

pub const EMBEDDINGS_FILE_NAME: &str = "embeddings-cache.json";

#[derive(Debug, thiserror::Error)]
pub enum VectorStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

pub struct VectorStorage {
    store: Arc<dyn StorageManager>,
}

impl VectorStorage {
    pub fn new(store: Arc<dyn StorageManager>) -> Self {
        Self { store }
    }

    pub fn exists(&self) -> bool {
        self.store.exists(EMBEDDINGS_FILE_NAME)
    }

    /// Load the stored mapping. Entries that do not fit the index are skipped.
    pub fn load(&self) -> Result<VectorIndex, VectorStorageError> {
        let bytes = self.store.read(EMBEDDINGS_FILE_NAME)?;
        let raw: HashMap<String, Vec<f32>> = serde_json::from_slice(&bytes)?;

        // sorted so the dimensionality winner does not depend on hash order
        let mut raw: Vec<_> = raw.into_iter().collect();
        raw.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index = VectorIndex::with_capacity(raw.len());
        for (id, embedding) in raw {
            if let Err(err) = index.insert(&id, embedding) {
                log::warn!("skipping stored embedding for '{id}': {err}");
            }
        }

        Ok(index)
    }

    pub fn save(&self, index: &VectorIndex) -> Result<(), VectorStorageError> {
        let raw: HashMap<&str, &[f32]> = index.iter().collect();
        let bytes = serde_json::to_vec(&raw)?;
        self.store.write(EMBEDDINGS_FILE_NAME, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BackendLocal;

    fn storage() -> (VectorStorage, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store = Arc::new(BackendLocal::new(tmp.path()).unwrap());
        (VectorStorage::new(store), tmp)
    }

    #[test]
    fn test_save_and_load() {
        let (storage, _tmp) = storage();
        let mut index = VectorIndex::new();
        index.insert("Alpha", vec![0.5, 0.25]).unwrap();
        index.insert("Beta", vec![-1.0, 2.0]).unwrap();

        storage.save(&index).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("Alpha"), Some(&[0.5, 0.25][..]));
        assert_eq!(loaded.get("Beta"), Some(&[-1.0, 2.0][..]));
    }

    #[test]
    fn test_load_skips_bad_entries() {
        let (storage, tmp) = storage();
        std::fs::write(
            tmp.path().join(EMBEDDINGS_FILE_NAME),
            r#"{"a":[1.0,0.0],"b":[1.0],"c":[]}"#,
        )
        .unwrap();

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains("a"));
    }

    #[test]
    fn test_load_malformed_file() {
        let (storage, tmp) = storage();
        std::fs::write(tmp.path().join(EMBEDDINGS_FILE_NAME), "not json").unwrap();

        assert!(matches!(storage.load(), Err(VectorStorageError::InvalidFormat(_))));
    }
}
