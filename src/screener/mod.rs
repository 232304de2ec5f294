//! Stock screener
//!
//! Natural-language screening over a CSV of stock metrics:
//! query -> criteria -> SQL -> rows.

pub mod dataset;
pub mod translator;

pub use dataset::StockDataset;
pub use translator::QueryTranslator;

use crate::config::ScreenerConfig;
use crate::error::AssistantError;
use crate::gemini::GeminiClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, warn};

/// Rows of a screen, or the SQL error that prevented them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreenRows {
    Rows(Vec<Map<String, Value>>),
    Failed { error: String },
}

impl ScreenRows {
    pub fn count(&self) -> usize {
        match self {
            ScreenRows::Rows(rows) => rows.len(),
            ScreenRows::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResult {
    pub query: String,
    pub extracted_criteria: String,
    pub sql_query: String,
    pub count: usize,
    pub results: ScreenRows,
}

pub struct Screener {
    translator: QueryTranslator,
    dataset: Option<StockDataset>,
}

impl Screener {
    pub fn new(translator: QueryTranslator, dataset: Option<StockDataset>) -> Self {
        Self { translator, dataset }
    }

    /// Gemini-backed screener; a dataset that fails to load leaves the
    /// screener running but unable to answer
    pub async fn from_config(config: &ScreenerConfig) -> crate::Result<Self> {
        let criteria_model = GeminiClient::new(
            &config.gemini_api_key,
            &config.gemini_base_url,
            &config.criteria_model,
        )?;
        let sql_model = GeminiClient::new(
            &config.gemini_api_key,
            &config.gemini_base_url,
            &config.sql_model,
        )?;

        let dataset = match StockDataset::from_csv_path(&config.csv_path).await {
            Ok(dataset) => Some(dataset),
            Err(e) => {
                error!("Error loading data: {}", e);
                None
            }
        };

        Ok(Self::new(
            QueryTranslator::new(Arc::new(criteria_model), Arc::new(sql_model)),
            dataset,
        ))
    }

    pub fn is_loaded(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn dataset(&self) -> Option<&StockDataset> {
        self.dataset.as_ref()
    }

    /// Run the full pipeline for one query.
    ///
    /// SQL failures are part of the result; model failures are errors.
    pub async fn screen(&self, user_query: &str) -> crate::Result<ScreenResult> {
        let dataset = self.dataset.as_ref().ok_or_else(|| {
            AssistantError::DatasetError("Stock data not loaded. Check server logs.".to_string())
        })?;

        let user_query = user_query.trim();
        if user_query.is_empty() {
            return Err(AssistantError::InvalidQuery(
                "No query provided. Use '?query=your screening criteria'".to_string(),
            ));
        }

        let criteria = self.translator.extract_criteria(user_query).await?;
        let sql = self.translator.generate_sql(&criteria, dataset.columns()).await?;

        let results = match dataset.execute(&sql).await {
            Ok(rows) => ScreenRows::Rows(rows),
            Err(e) => {
                warn!("Generated SQL failed: {}", e);
                let detail = match e {
                    AssistantError::SqlError(message) => message,
                    other => other.to_string(),
                };
                ScreenRows::Failed {
                    error: format!("SQL Execution Error: {}", detail),
                }
            }
        };

        Ok(ScreenResult {
            query: user_query.to_string(),
            extracted_criteria: criteria,
            sql_query: sql,
            count: results.count(),
            results,
        })
    }
}
