//! Runtime configuration
//!
//! Both services read their settings from the environment (after `dotenv`
//! has loaded `.env`). Only secrets have no default.

use crate::error::AssistantError;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TICKERS_URL: &str = "https://yahoo-finance15.p.rapidapi.com/api/v2/markets/tickers";
const DEFAULT_QUOTE_URL: &str = "https://yahoo-finance15.p.rapidapi.com/api/v1/markets/quote";
const DEFAULT_ESG_URL: &str = "https://yahoo-finance127.p.rapidapi.com/esg-scores";
const DEFAULT_LOCAL_LLM_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Settings for the market data APIs
#[derive(Debug, Clone)]
pub struct MarketApiConfig {
    pub rapidapi_key: String,
    pub tickers_url: String,
    pub quote_url: String,
    /// ESG endpoint; the symbol is appended as a path segment
    pub esg_url: String,
    pub request_timeout: Duration,
    /// Pages walked when looking a symbol up in the ticker list
    pub search_pages: u32,
}

impl Default for MarketApiConfig {
    fn default() -> Self {
        Self {
            rapidapi_key: String::new(),
            tickers_url: DEFAULT_TICKERS_URL.to_string(),
            quote_url: DEFAULT_QUOTE_URL.to_string(),
            esg_url: DEFAULT_ESG_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            search_pages: 5,
        }
    }
}

/// Settings for the conversational chatbot
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub market: MarketApiConfig,
    /// Base URL of an OpenAI-compatible completion server (llama.cpp, LM Studio)
    pub local_llm_url: String,
    pub local_llm_model: String,
    pub max_history: usize,
    /// Live sessions kept before idle ones are evicted
    pub max_sessions: usize,
    pub cache_ttl: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            market: MarketApiConfig::default(),
            local_llm_url: DEFAULT_LOCAL_LLM_URL.to_string(),
            local_llm_model: "finance-chat.Q8_0.gguf".to_string(),
            max_history: 5,
            max_sessions: crate::memory::sessions::DEFAULT_MAX_SESSIONS,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

impl ChatConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let rapidapi_key = env::var("RAPIDAPI_KEY").unwrap_or_default();
        if rapidapi_key.is_empty() {
            tracing::warn!("RAPIDAPI_KEY not set; market data requests will be rejected upstream");
        }

        let market = MarketApiConfig {
            rapidapi_key,
            tickers_url: env_or("TICKERS_URL", defaults.market.tickers_url),
            quote_url: env_or("QUOTE_URL", defaults.market.quote_url),
            esg_url: env_or("ESG_URL", defaults.market.esg_url),
            request_timeout: defaults.market.request_timeout,
            search_pages: parse_env("TICKER_SEARCH_PAGES", defaults.market.search_pages)?,
        };

        let config = Self {
            market,
            local_llm_url: env_or("LOCAL_LLM_URL", defaults.local_llm_url),
            local_llm_model: env_or("LOCAL_LLM_MODEL", defaults.local_llm_model),
            max_history: parse_env("CHAT_MAX_HISTORY", defaults.max_history)?,
            max_sessions: parse_env("CHAT_MAX_SESSIONS", defaults.max_sessions)?,
            cache_ttl: Duration::from_secs(parse_env(
                "TICKER_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_history == 0 {
            return Err(AssistantError::ConfigError(
                "CHAT_MAX_HISTORY must be greater than 0".to_string(),
            ));
        }
        if self.max_sessions == 0 {
            return Err(AssistantError::ConfigError(
                "CHAT_MAX_SESSIONS must be greater than 0".to_string(),
            ));
        }
        if self.market.search_pages == 0 {
            return Err(AssistantError::ConfigError(
                "TICKER_SEARCH_PAGES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the stock screener service
#[derive(Debug, Clone)]
pub struct ScreenerConfig {
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    /// Model that turns free text into screening criteria
    pub criteria_model: String,
    /// Model that turns criteria into SQL
    pub sql_model: String,
    pub csv_path: PathBuf,
}

impl ScreenerConfig {
    pub fn from_env() -> Result<Self> {
        let gemini_api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            AssistantError::ConfigError("GEMINI_API_KEY not configured".to_string())
        })?;

        Ok(Self {
            gemini_api_key,
            gemini_base_url: env_or("GEMINI_BASE_URL", DEFAULT_GEMINI_URL.to_string()),
            criteria_model: env_or(
                "GEMINI_CRITERIA_MODEL",
                "models/gemini-2.0-flash".to_string(),
            ),
            sql_model: env_or("GEMINI_SQL_MODEL", "models/gemini-2.0-flash".to_string()),
            csv_path: PathBuf::from(env_or(
                "SCREENER_CSV",
                "stock_screener_data.csv".to_string(),
            )),
        })
    }
}

/// Port for the HTTP API (`PORT`, then `API_PORT`, then 5000)
pub fn api_port() -> Result<u16> {
    env::var("PORT")
        .or_else(|_| env::var("API_PORT"))
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .map_err(|e| AssistantError::ConfigError(format!("Invalid port: {}", e)))
}

fn env_or(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(default)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            AssistantError::ConfigError(format!("Invalid value for {}: {}", key, e))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_defaults() {
        let config = ChatConfig::default();
        assert_eq!(config.max_history, 5);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.market.request_timeout, Duration::from_secs(10));
        assert_eq!(config.market.search_pages, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_history_rejected() {
        let config = ChatConfig {
            max_history: 0,
            ..ChatConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AssistantError::ConfigError(_))
        ));
    }

    #[test]
    fn test_zero_sessions_rejected() {
        let config = ChatConfig {
            max_sessions: 0,
            ..ChatConfig::default()
        };
        tokio_test::assert_err!(config.validate());
        assert_eq!(ChatConfig::default().max_sessions, 1000);
    }

    #[test]
    fn test_parse_env_fallback() {
        let value: u32 = parse_env("ESG_ASSISTANT_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }
}
