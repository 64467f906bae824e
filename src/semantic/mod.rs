//! Embedding-based note similarity.
//!
//! # Architecture
//!
//! - `index`: In-memory id -> vector map with cosine similarity
//! - `storage`: JSON persistence for the index
//! - `preprocess`: Text preparation for embedding input
//! - `service`: Lazily loaded, invalidatable embedding cache
//! - `similarity`: Depth-limited expansion and greedy clustering

mod index;
mod preprocess;
mod service;
mod similarity;
mod storage;

pub use preprocess::preprocess_content;
pub use service::EmbeddingCache;
pub use similarity::{cluster_by_similarity, expand_by_similarity};
