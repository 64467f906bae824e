//! Scripted language model for deterministic tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::llm::{CompletionOptions, LanguageModel};

#[derive(Default)]
pub struct ScriptedModel {
    embeddings: HashMap<String, Vec<f32>>,
    responses: Mutex<VecDeque<String>>,
    default_response: String,
    prompts: Mutex<Vec<String>>,
    embed_calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embedding returned for an exact input text.
    pub fn with_embedding(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_string(), embedding);
        self
    }

    /// Queue a completion. Queued responses are used before the default.
    pub fn with_response(self, response: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(response.to_string());
        self
    }

    pub fn with_default_response(mut self, response: &str) -> Self {
        self.default_response = response.to_string();
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn completion_calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn embed_calls(&self) -> usize {
        *self.embed_calls.lock().unwrap()
    }
}

impl LanguageModel for ScriptedModel {
    fn embed(&self, text: &str) -> Vec<f32> {
        *self.embed_calls.lock().unwrap() += 1;
        self.embeddings.get(text).cloned().unwrap_or_default()
    }

    fn complete(&self, prompt: &str, _options: &CompletionOptions) -> String {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}
