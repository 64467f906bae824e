use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::llm::{CompletionOptions, LanguageModel, LlmError};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Blocking client for an OpenAI-compatible local server (LM Studio, llama.cpp, ...).
pub struct HttpLanguageModel {
    client: reqwest::blocking::Client,
    base_url: String,
    embedding_model: String,
}

impl HttpLanguageModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1{}", self.base_url, path)
    }

    fn check_status(
        resp: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, LlmError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(LlmError::Status { status, body })
    }

    pub fn try_complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: &options.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature,
            stream: false,
        };

        let resp = self
            .client
            .post(self.endpoint("/chat/completions"))
            .json(&request)
            .send()?;
        let result: ChatCompletionResponse = Self::check_status(resp)?.json()?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse("choices"))
    }

    pub fn try_embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
        };

        let resp = self
            .client
            .post(self.endpoint("/embeddings"))
            .json(&request)
            .send()?;
        let result: EmbeddingResponse = Self::check_status(resp)?.json()?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or(LlmError::EmptyResponse("embedding"))
    }
}

impl LanguageModel for HttpLanguageModel {
    fn embed(&self, text: &str) -> Vec<f32> {
        self.try_embed(text).unwrap_or_else(|err| {
            log::error!("embedding request failed: {err}");
            Vec::new()
        })
    }

    fn complete(&self, prompt: &str, options: &CompletionOptions) -> String {
        match self.try_complete(prompt, options) {
            Ok(text) => {
                log::debug!("completion length: {}", text.len());
                text
            }
            Err(err) => {
                log::error!("completion request failed: {err}");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let config = LlmConfig {
            base_url: "http://localhost:1234/".to_string(),
            ..Default::default()
        };
        let model = HttpLanguageModel::new(&config).unwrap();
        assert_eq!(
            model.endpoint("/chat/completions"),
            "http://localhost:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_unreachable_server_degrades_to_empty() {
        // port 9 (discard) is closed on test machines
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let model = HttpLanguageModel::new(&config).unwrap();
        let options = CompletionOptions {
            model: "m".to_string(),
            temperature: 0.0,
        };

        assert_eq!(model.complete("hello", &options), "");
        assert!(model.embed("hello").is_empty());
    }

    #[test]
    fn test_response_shapes() {
        let chat: ChatCompletionResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(chat.choices[0].message.content.as_deref(), Some("hi"));

        let emb: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"embedding":[0.1,0.2],"index":0}],"model":"m"}"#)
                .unwrap();
        assert_eq!(emb.data[0].embedding, vec![0.1, 0.2]);
    }
}
