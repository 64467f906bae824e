//! Process-lifetime embedding cache.
//!
//! - Loads the stored index on first use and keeps it in memory
//! - `invalidate()` drops the in-memory copy so the next access reloads
//! - `reindex()` re-embeds every note and replaces the store wholesale

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

use crate::llm::LanguageModel;
use crate::notes::Note;
use crate::semantic::index::VectorIndex;
use crate::semantic::preprocess::preprocess_content;
use crate::semantic::storage::{VectorStorage, VectorStorageError};
use crate::storage::StorageManager;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingCacheError {
    #[error("Storage error: {0}")]
    Storage(#[from] VectorStorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub struct EmbeddingCache {
    storage: VectorStorage,
    /// Loaded index. `Mutex<Option<_>>` so a reload and a read never interleave.
    state: Mutex<Option<VectorIndex>>,
}

impl EmbeddingCache {
    pub fn new(store: Arc<dyn StorageManager>) -> Self {
        Self {
            storage: VectorStorage::new(store),
            state: Mutex::new(None),
        }
    }

    /// Run `f` against the loaded index, loading it first if needed.
    ///
    /// A missing or unreadable store loads as an empty index.
    pub fn with_index<F, R>(&self, f: F) -> Result<R, EmbeddingCacheError>
    where
        F: FnOnce(&VectorIndex) -> R,
    {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| EmbeddingCacheError::Internal(format!("Lock poisoned: {}", e)))?;

        if guard.is_none() {
            *guard = Some(self.load());
        }

        let index = guard
            .as_ref()
            .ok_or_else(|| EmbeddingCacheError::Internal("index not loaded".to_string()))?;
        Ok(f(index))
    }

    pub fn is_loaded(&self) -> bool {
        self.state
            .lock()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.with_index(|index| index.len()).unwrap_or(0)
    }

    /// Forget the in-memory copy.
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = None;
        }
    }

    /// Embed every note, persist the result and make it the live index.
    ///
    /// Notes with no text or whose embedding call fails are left out.
    pub fn reindex(
        &self,
        notes: &[Note],
        llm: &dyn LanguageModel,
        show_progress: bool,
    ) -> Result<usize, EmbeddingCacheError> {
        let progress = if show_progress {
            let bar = ProgressBar::new(notes.len() as u64);
            if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let mut index = VectorIndex::with_capacity(notes.len());
        for note in notes {
            progress.set_message(note.title.clone());
            progress.inc(1);

            let Some(text) = note.content.as_deref().and_then(preprocess_content) else {
                log::debug!("'{}' has no content, not embedded", note.id);
                continue;
            };

            let embedding = llm.embed(&text);
            if let Err(err) = index.insert(&note.id, embedding) {
                log::warn!("no embedding stored for '{}': {err}", note.id);
            }
        }
        progress.finish_and_clear();

        self.storage.save(&index)?;
        let count = index.len();
        log::info!("reindexed {count} of {} notes", notes.len());

        let mut guard = self
            .state
            .lock()
            .map_err(|e| EmbeddingCacheError::Internal(format!("Lock poisoned: {}", e)))?;
        *guard = Some(index);

        Ok(count)
    }

    fn load(&self) -> VectorIndex {
        if !self.storage.exists() {
            log::info!("No stored embeddings, starting empty");
            return VectorIndex::new();
        }

        match self.storage.load() {
            Ok(index) => {
                log::info!("Loaded {} embeddings from storage", index.len());
                index
            }
            Err(err) => {
                log::warn!("Failed to load embeddings, starting empty: {err}");
                VectorIndex::new()
            }
        }
    }
}
