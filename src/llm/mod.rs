//! Language model collaborator.
//!
//! Both calls are infallible from the caller's point of view: a failed
//! request comes back as an empty string or an empty vector and is logged
//! where it happened.

#[cfg(test)]
pub mod mock;
mod openai;

pub use openai::HttpLanguageModel;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
}

pub trait LanguageModel: Send + Sync {
    /// Embedding for `text`, empty on failure.
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Completion for `prompt`, empty on failure.
    fn complete(&self, prompt: &str, options: &CompletionOptions) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("response carried no {0}")]
    EmptyResponse(&'static str),
}
