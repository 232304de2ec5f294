use esg_finance_assistant::{
    api::start_server,
    config::{api_port, ChatConfig, ScreenerConfig},
    screener::Screener,
    FinanceChatbot,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = api_port()?;

    info!("🚀 ESG Finance Assistant - API Server");
    info!("📍 Port: {}", port);

    let chat_config = ChatConfig::from_env()?;
    let chatbot = Arc::new(FinanceChatbot::from_config(&chat_config)?);
    info!("✅ Chatbot initialized (local model at {})", chat_config.local_llm_url);

    // The screener needs Gemini and the CSV; the chat endpoint works without it
    let screener = match ScreenerConfig::from_env() {
        Ok(config) => {
            let screener = Screener::from_config(&config).await?;
            if !screener.is_loaded() {
                warn!("Stock data not loaded from {}", config.csv_path.display());
            }
            Some(Arc::new(screener))
        }
        Err(e) => {
            warn!("Screener disabled: {}", e);
            eprintln!("📌 Set GEMINI_API_KEY in .env to enable /screen");
            None
        }
    };

    info!("📡 Starting API server...");
    start_server(chatbot, screener, port).await?;

    Ok(())
}
