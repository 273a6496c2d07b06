use super::{Completion, CompletionRequest};
use crate::error::{Error, Result};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum LlmConfig {
    Ollama {
        url: String,
        model: String,
        timeout: Duration,
    },
    OpenAI {
        url: String,
        model: String,
        api_key: String,
        timeout: Duration,
    },
}

impl LlmConfig {
    pub fn model(&self) -> &str {
        match self {
            LlmConfig::Ollama { model, .. } | LlmConfig::OpenAI { model, .. } => model,
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            LlmConfig::Ollama { timeout, .. } | LlmConfig::OpenAI { timeout, .. } => *timeout,
        }
    }
}

/// Blocking text-completion client
pub struct LlmClient {
    client: Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn query_ollama(&self, url: &str, model: &str, request: &CompletionRequest) -> Result<String> {
        let endpoint = format!("{}/api/generate", url.trim_end_matches('/'));

        let mut options = json!({ "temperature": request.temperature });
        if let Some(max_tokens) = request.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }

        let body = json!({
            "model": model,
            "prompt": request.prompt,
            "options": options,
            "stream": false
        });

        let response = self.client.post(&endpoint).json(&body).send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LlmApiError(format!("Ollama API error {}: {}", status, error_text)));
        }

        let json: Value = response.json()?;

        json.get("response")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| Error::LlmApiError("No response field in Ollama response".to_string()))
    }

    fn query_openai(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<String> {
        let endpoint = format!("{}/v1/chat/completions", url.trim_end_matches('/'));

        let mut body = json!({
            "model": model,
            "messages": [
                {
                    "role": "user",
                    "content": request.prompt
                }
            ],
            "temperature": request.temperature
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let response = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::LlmApiError(format!("OpenAI API error {}: {}", status, error_text)));
        }

        let json: Value = response.json()?;
        parse_chat_content(&json)
    }
}

impl Completion for LlmClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match &self.config {
            LlmConfig::Ollama { url, model, .. } => self.query_ollama(url, model, request),
            LlmConfig::OpenAI {
                url,
                model,
                api_key,
                ..
            } => self.query_openai(url, model, api_key, request),
        }
    }
}

fn parse_chat_content(json: &Value) -> Result<String> {
    json.get("choices")
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| Error::LlmApiError("Invalid OpenAI response format".to_string()))
}
