//! Local text-generation backend
//!
//! The chatbot talks to a locally served model through an OpenAI-compatible
//! `/v1/completions` endpoint (llama.cpp server, LM Studio, vLLM).
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AssistantError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

/// Sampling settings sent with every completion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DecodingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for DecodingParams {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            temperature: 0.7,
            top_p: 0.95,
        }
    }
}

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &DecodingParams) -> crate::Result<String>;
}

/// Client for an OpenAI-compatible completion server
pub struct LocalCompletionClient {
    client: Client,
    base_url: String,
    model: String,
}

impl LocalCompletionClient {
    pub fn new(base_url: &str, model: &str) -> crate::Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            // Local generation of 800 tokens can take a while on CPU
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    params: DecodingParams,
}

#[async_trait]
impl TextGenerator for LocalCompletionClient {
    async fn generate(&self, prompt: &str, params: &DecodingParams) -> crate::Result<String> {
        let url = format!("{}/v1/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            prompt,
            params: *params,
        };

        info!("Sending prompt to local model ({} chars)", prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Local model request failed: {}", e);
                AssistantError::LlmError(format!("Local model unreachable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Local model error response ({}): {}", status, error_text);
            return Err(AssistantError::LlmError(format!(
                "Local model returned {}: {}",
                status, error_text
            )));
        }

        let output: Value = response.json().await.map_err(|e| {
            AssistantError::LlmError(format!("Local model parse error: {}", e))
        })?;

        Ok(extract_generated_text(&output))
    }
}

/// Plain text from whatever shape the backend returned.
///
/// Accepts a bare string, a `{"choices": [{"text": ...}]}` record, or a
/// list whose first element is text or carries `text`. Anything else is
/// rendered as JSON.
pub fn extract_generated_text(output: &Value) -> String {
    let text = match output {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::Array(items) => match items.first() {
            Some(Value::String(s)) => s.clone(),
            Some(first) => first
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| first.to_string()),
            None => String::new(),
        },
        other => {
            warn!("Unexpected output type from local model");
            other.to_string()
        }
    };

    text.trim().to_string()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_from_choices() {
        let output = json!({ "choices": [{ "text": "  Apple looks solid.\n" }] });
        assert_eq!(extract_generated_text(&output), "Apple looks solid.");
    }

    #[test]
    fn test_extract_from_string_and_list() {
        assert_eq!(extract_generated_text(&json!(" hi ")), "hi");
        assert_eq!(extract_generated_text(&json!([{ "text": "first" }, { "text": "second" }])), "first");
        assert_eq!(extract_generated_text(&json!(["plain"])), "plain");
        assert_eq!(extract_generated_text(&json!({ "choices": [] })), "");
    }

    #[test]
    fn test_request_serialization() {
        let request = CompletionRequest {
            model: "finance-chat",
            prompt: "What is ESG?",
            params: DecodingParams::default(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["max_tokens"], 800);
        assert_eq!(json["prompt"], "What is ESG?");
        assert!(json.get("params").is_none());
    }

    mod live {
        use super::*;
        use axum::extract::State;
        use axum::http::StatusCode;
        use axum::routing::post;
        use axum::{Json, Router};
        use std::sync::{Arc, Mutex};

        type Captured = Arc<Mutex<Option<Value>>>;

        async fn completions(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
            *captured.lock().unwrap() = Some(body);
            Json(json!({ "choices": [{ "text": "  Apple scores well on governance.\n" }] }))
        }

        async fn overloaded() -> (StatusCode, &'static str) {
            (StatusCode::SERVICE_UNAVAILABLE, "model loading")
        }

        #[tokio::test]
        async fn test_generate_posts_completion_request() {
            let captured: Captured = Arc::default();
            let router = Router::new()
                .route("/v1/completions", post(completions))
                .with_state(captured.clone());
            let base = crate::testing::serve(router).await;

            let client = LocalCompletionClient::new(&format!("{}/", base), "finance-chat").unwrap();
            let answer = client
                .generate("Is AAPL sustainable?", &DecodingParams::default())
                .await
                .unwrap();

            assert_eq!(answer, "Apple scores well on governance.");
            let body = captured.lock().unwrap().clone().unwrap();
            assert_eq!(body["model"], "finance-chat");
            assert_eq!(body["prompt"], "Is AAPL sustainable?");
            assert_eq!(body["max_tokens"], 800);
        }

        #[tokio::test]
        async fn test_error_status_is_reported() {
            let router = Router::new().route("/v1/completions", post(overloaded));
            let base = crate::testing::serve(router).await;

            let client = LocalCompletionClient::new(&base, "finance-chat").unwrap();
            let err = client
                .generate("hello", &DecodingParams::default())
                .await
                .unwrap_err();

            assert!(matches!(err, AssistantError::LlmError(_)));
            assert!(err.to_string().contains("503"));
            assert!(err.to_string().contains("model loading"));
        }
    }
}
