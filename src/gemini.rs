//! Gemini API client for the stock screener
//!
//! One client per model; both screener stages (criteria extraction and SQL
//! generation) go through [`CompletionModel`].
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::error::AssistantError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

/// Prompt in, text out
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> crate::Result<String>;
}

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl GeminiClient {
    /// `model` is the full resource name, e.g. `models/gemini-2.0-flash`
    /// or `tunedModels/...`
    pub fn new(api_key: &str, base_url: &str, model: &str) -> crate::Result<Self> {
        if api_key.is_empty() {
            return Err(AssistantError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            endpoint: generate_content_url(base_url, model),
            model: model.to_string(),
        })
    }
}

fn generate_content_url(base_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/{}:generateContent",
        base_url.trim_end_matches('/'),
        model.trim_start_matches('/')
    )
}

#[async_trait]
impl CompletionModel for GeminiClient {
    async fn complete(&self, prompt: &str) -> crate::Result<String> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        info!("Calling Gemini model {}", self.model);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                AssistantError::LlmError(format!("Gemini API error: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(AssistantError::LlmError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            error!("Failed to parse Gemini response: {}", e);
            AssistantError::LlmError(format!("Gemini parse error: {}", e))
        })?;

        let answer = gemini_response.first_text()?;

        if let Some(usage) = &gemini_response.usage_metadata {
            info!(
                "Gemini response received ({} prompt / {} candidate tokens)",
                usage.prompt_token_count, usage.candidates_token_count
            );
        }

        Ok(answer.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: i32,
    max_output_tokens: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}

impl GeminiResponse {
    /// Text of the first candidate's parts, joined
    fn first_text(&self) -> crate::Result<String> {
        let candidate = self.candidates.first().ok_or_else(|| {
            AssistantError::LlmError("No response from Gemini API".to_string())
        })?;

        let parts = candidate
            .content
            .as_ref()
            .map(|content| content.parts.as_slice())
            .unwrap_or_default();

        if parts.is_empty() {
            return Err(AssistantError::LlmError(format!(
                "Empty response from Gemini (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(parts.iter().map(|p| p.text.as_str()).collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Model that replays canned completions in order
    pub struct ScriptedModel {
        replies: Mutex<VecDeque<crate::Result<String>>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        pub fn replying(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|r| Ok(r.to_string())).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            let mut replies = VecDeque::new();
            replies.push_back(Err(AssistantError::LlmError(message.to_string())));
            Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn prompt(&self, index: usize) -> Option<String> {
            self.prompts.lock().unwrap().get(index).cloned()
        }
    }

    #[async_trait]
    impl CompletionModel for ScriptedModel {
        async fn complete(&self, prompt: &str) -> crate::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(AssistantError::LlmError("no scripted reply".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: "Stocks with P/E below 15".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.2,
                top_p: 0.9,
                top_k: 40,
                max_output_tokens: 1024,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Stocks with P/E below 15");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            generate_content_url("https://generativelanguage.googleapis.com/", "models/gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_missing_api_key() {
        let result = GeminiClient::new("", "https://example.test", "models/gemini-2.0-flash");
        let message = result.err().unwrap().to_string();
        assert!(message.to_lowercase().contains("gemini_api_key"));
    }

    #[test]
    fn test_response_text() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Price_to_Earnings_Ratio_(TTM)" }, { "text": " < 15" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 120, "candidatesTokenCount": 9 }
        }))
        .unwrap();

        assert_eq!(response.first_text().unwrap(), "Price_to_Earnings_Ratio_(TTM) < 15");
        assert_eq!(response.usage_metadata.unwrap().candidates_token_count, 9);
    }

    #[test]
    fn test_blocked_response() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        let err = response.first_text().unwrap_err().to_string();
        assert!(err.contains("SAFETY"));

        let empty: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.first_text().is_err());
    }

    mod live {
        use super::*;
        use axum::http::Uri;
        use axum::{Json, Router};
        use serde_json::Value;

        async fn generate_content(uri: Uri, Json(body): Json<Value>) -> Json<Value> {
            let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or_default();

            Json(json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": format!("{}?{}", uri.path(), uri.query().unwrap_or_default()) },
                        { "text": format!(" | {}", prompt) }
                    ] },
                    "finishReason": "STOP"
                }]
            }))
        }

        #[tokio::test]
        async fn test_complete_against_local_server() {
            let base = crate::testing::serve(Router::new().fallback(generate_content)).await;
            let client = GeminiClient::new("test-key", &base, "models/gemini-test").unwrap();

            let answer = client.complete("Dividend_Yield > 3").await.unwrap();

            assert_eq!(
                answer,
                "/v1beta/models/gemini-test:generateContent?key=test-key | Dividend_Yield > 3"
            );
        }
    }
}
