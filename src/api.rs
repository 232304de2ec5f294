//! REST API server
//!
//! Exposes the stock screener and the ESG chatbot over HTTP.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::conversational::FinanceChatbot;
use crate::error::AssistantError;
use crate::screener::Screener;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ScreenParams {
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub message: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub chatbot: Arc<FinanceChatbot>,
    pub screener: Option<Arc<Screener>>,
}

/// =============================
/// Helpers
/// =============================

fn stable_uuid_from_string(input: &str) -> uuid::Uuid {
    use sha2::{Digest, Sha256};

    let hash = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);

    // Set UUID version (4) and variant (RFC4122) bits.
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes)
}

/// Session key for a request: UUIDs pass through, other strings map to a
/// stable UUID, missing ids get a fresh one
fn session_key(value: Option<&str>) -> uuid::Uuid {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => {
            uuid::Uuid::parse_str(v).unwrap_or_else(|_| stable_uuid_from_string(v))
        }
        _ => uuid::Uuid::new_v4(),
    }
}

fn json_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// =============================
/// Static Endpoints
/// =============================

const HOME_PAGE: &str = r#"<html>
<head>
    <title>Stock Screener API</title>
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; line-height: 1.6; }
        h1 { color: #333; }
        code { background: #f4f4f4; padding: 2px 5px; border-radius: 3px; }
    </style>
</head>
<body>
    <h1>Stock Screener API</h1>
    <p>Use the /screen endpoint with a 'query' parameter to screen stocks.</p>
    <p>Example: <code>/screen?query=Find stocks with P/E ratio less than 15 and dividend yield greater than 3%</code></p>
    <p>Chat with the ESG assistant: <code>POST /api/chat {"session_id": "...", "message": "How is AAPL doing?"}</code></p>
</body>
</html>"#;

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Screener Endpoint
/// =============================

async fn screen_handler(
    State(state): State<ApiState>,
    Query(params): Query<ScreenParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(screener) = state.screener.as_ref().filter(|s| s.is_loaded()) else {
        return json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Stock data not loaded. Check server logs.",
        );
    };

    let query = params.query.unwrap_or_default();
    if query.trim().is_empty() {
        return json_error(
            StatusCode::BAD_REQUEST,
            "No query provided. Use '?query=your screening criteria'",
        );
    }

    info!("Received screen request: {}", query);

    match screener.screen(&query).await {
        Ok(result) => match serde_json::to_value(&result) {
            Ok(body) => (StatusCode::OK, Json(body)),
            Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e)),
        },
        Err(AssistantError::InvalidQuery(message)) => json_error(StatusCode::BAD_REQUEST, message),
        Err(e) => {
            error!("Screen request failed: {}", e);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Processing error: {}", e))
        }
    }
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let message = req.message.as_deref().map(str::trim).unwrap_or_default();
    if message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("Message must not be empty".into())),
        );
    }

    let session_id = session_key(req.session_id.as_deref()).to_string();
    info!("chat_handler session_id={}", session_id);

    let reply = state.chatbot.respond(&session_id, message).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "answer": reply.answer,
            "active_symbol": reply.active_symbol,
            "detected_symbols": reply.detected_symbols,
            "session_id": session_id,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(chatbot: Arc<FinanceChatbot>, screener: Option<Arc<Screener>>) -> Router {
    let state = ApiState { chatbot, screener };

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/screen", get(screen_handler))
        .route("/api/chat", post(chat_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    chatbot: Arc<FinanceChatbot>,
    screener: Option<Arc<Screener>>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(chatbot, screener);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
