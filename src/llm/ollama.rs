//! Ollama backend: `POST {url}/api/generate` with `stream: false`.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

const PROVIDER: &str = "ollama";

/// Completion provider for a local (or gateway-fronted) Ollama instance.
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<SecretString>,
}

/// Subset of the `/api/generate` response we rely on.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    done_reason: Option<String>,
}

impl OllamaProvider {
    pub fn new(url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut options = serde_json::Map::new();
        if let Some(t) = request.temperature {
            options.insert("temperature".into(), json!(t));
        }
        if let Some(p) = request.top_p {
            options.insert("top_p".into(), json!(p));
        }
        if let Some(n) = request.max_tokens {
            options.insert("num_predict".into(), json!(n));
        }

        let mut body = json!({
            "model": self.model,
            "prompt": request.prompt_text(),
            "stream": false,
            "options": options,
        });
        if let Some(system) = request.system_text() {
            body["system"] = json!(system);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.request_body(&request);

        let mut http = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body);
        if let Some(ref key) = self.api_key {
            http = http.bearer_auth(key.expose_secret());
        }

        let response = http.send().await.map_err(|e| LlmError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("is Ollama running at {}? {e}", self.url),
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "Ollama returned an error");
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        parse_generate_response(parsed)
    }
}

fn parse_generate_response(parsed: GenerateResponse) -> Result<CompletionResponse, LlmError> {
    let content = parsed.response.ok_or_else(|| LlmError::InvalidResponse {
        provider: PROVIDER.to_string(),
        reason: "missing `response` field".to_string(),
    })?;

    let finish_reason = match parsed.done_reason.as_deref() {
        Some("stop") => FinishReason::Stop,
        Some("length") => FinishReason::Length,
        _ => FinishReason::Unknown,
    };

    Ok(CompletionResponse {
        content,
        input_tokens: parsed.prompt_eval_count,
        output_tokens: parsed.eval_count,
        finish_reason,
    })
}
