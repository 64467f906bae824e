//! Bridge synthesis between clusters.
//!
//! - `candidate`: prompt text and strict parsing of model output
//! - `combinations`: iterative pair enumeration
//! - `cache`: persistent per-pair results
//! - `synthesizer`: drives the above over a cluster partition

mod cache;
mod candidate;
mod combinations;
mod synthesizer;

pub use cache::BridgeCache;
pub use synthesizer::BridgeSynthesizer;
