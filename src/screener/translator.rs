//! Natural language to SQL
//!
//! Two model calls: the first pulls the explicit screening criteria out of
//! the user's text, the second turns those criteria into a SELECT over the
//! `stocks` table with a fixed column order.

use crate::gemini::CompletionModel;
use crate::screener::dataset::quote_ident;
use std::sync::Arc;
use tracing::info;

/// Columns that lead every generated SELECT, when present
pub const IMPORTANT_COLUMNS: &[&str] = &[
    "Symbol",
    "Name",
    "Price",
    "Market_Capitalization",
    "Price_to_Earnings_Ratio_(TTM)",
    "Dividend_Yield",
    "EPS",
    "Revenue_(TTM)",
    "Sector",
    "Industry",
];

/// Important columns first, then the rest in dataset order, all quoted
pub fn ordered_select_clause(columns: &[String]) -> String {
    let leading = IMPORTANT_COLUMNS
        .iter()
        .filter(|important| columns.iter().any(|c| c.as_str() == **important))
        .map(|c| quote_ident(c));

    let rest = columns
        .iter()
        .filter(|c| !IMPORTANT_COLUMNS.contains(&c.as_str()))
        .map(|c| quote_ident(c));

    leading.chain(rest).collect::<Vec<_>>().join(", ")
}

pub fn criteria_prompt(user_query: &str) -> String {
    format!(
        r#"Extract *only* the explicitly stated stock screening criteria from this user query. Do not add implied or additional conditions beyond what is clearly specified. Return the criteria as a concise string.

User Query: {user_query}

Examples:
- Query: "Find stocks with RSI above 70"
  Criteria: "Relative_Strength_Index_(14) > 70"
- Query: "Companies with low P/E ratio, less than 15"
  Criteria: "Price_to_Earnings_Ratio_(TTM) < 15"
- Query: "Stocks with market cap over 1 billion and positive earnings growth"
  Criteria: "Market_Capitalization > 1000000000 AND Net_Income_(TTM_YoY_Growth) > 0"

Criteria:"#
    )
}

pub fn sql_prompt(criteria: &str, columns: &[String]) -> String {
    let select_clause = ordered_select_clause(columns);
    let available = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"**Task:** Convert the following stock screening criteria into a SQL query. Use SELECT with the following column order: {select_clause}. Only include the exact criteria provided, without adding any extra conditions.

**Available Columns:** {available}

**User Criteria:** {criteria}

**Expected Output:** A valid SQL query selecting all columns from the 'stocks' dataset in the specified order, using the given criteria.

**Example Queries:**
- Criteria: "Relative_Strength_Index_(14) > 70"
  SQL: SELECT {select_clause} FROM stocks WHERE "Relative_Strength_Index_(14)" > 70;
- Criteria: "Price_to_Earnings_Ratio_(TTM) < 15"
  SQL: SELECT {select_clause} FROM stocks WHERE "Price_to_Earnings_Ratio_(TTM)" < 15;
- Criteria: "Market_Capitalization > 1000000000 AND Net_Income_(TTM_YoY_Growth) > 0"
  SQL: SELECT {select_clause} FROM stocks WHERE "Market_Capitalization" > 1000000000 AND "Net_Income_(TTM_YoY_Growth)" > 0;

**Output:**"#
    )
}

/// Remove a surrounding markdown code fence and its `sql` tag
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();

    let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed.to_string();
    };

    let inner = inner.trim_start();
    let inner = match inner.get(..3) {
        Some(tag) if tag.eq_ignore_ascii_case("sql") => &inner[3..],
        _ => inner,
    };

    inner.trim().to_string()
}

pub struct QueryTranslator {
    criteria_model: Arc<dyn CompletionModel>,
    sql_model: Arc<dyn CompletionModel>,
}

impl QueryTranslator {
    pub fn new(criteria_model: Arc<dyn CompletionModel>, sql_model: Arc<dyn CompletionModel>) -> Self {
        Self {
            criteria_model,
            sql_model,
        }
    }

    pub async fn extract_criteria(&self, user_query: &str) -> crate::Result<String> {
        let criteria = self.criteria_model.complete(&criteria_prompt(user_query)).await?;
        let criteria = criteria.trim().to_string();
        info!("Query: '{}' -> Criteria: '{}'", user_query, criteria);
        Ok(criteria)
    }

    pub async fn generate_sql(&self, criteria: &str, columns: &[String]) -> crate::Result<String> {
        let raw = self.sql_model.complete(&sql_prompt(criteria, columns)).await?;
        let sql = strip_code_fence(&raw);
        info!("SQL: {}", sql);
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::testing::ScriptedModel;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_order() {
        let cols = columns(&["Sector", "Beta", "Price", "Symbol", "Revenue_(TTM)"]);
        assert_eq!(
            ordered_select_clause(&cols),
            r#""Symbol", "Price", "Revenue_(TTM)", "Sector", "Beta""#
        );
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(
            strip_code_fence("```sql\nSELECT * FROM stocks;\n```"),
            "SELECT * FROM stocks;"
        );
        assert_eq!(strip_code_fence("```\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(strip_code_fence("  SELECT 1;  "), "SELECT 1;");
        assert_eq!(strip_code_fence("```sql SELECT 1"), "```sql SELECT 1");
    }

    #[test]
    fn test_sql_prompt_lists_columns() {
        let prompt = sql_prompt("Dividend_Yield > 3", &columns(&["Dividend_Yield", "Symbol"]));
        assert!(prompt.contains(r#"column order: "Symbol", "Dividend_Yield"."#));
        assert!(prompt.contains("**User Criteria:** Dividend_Yield > 3"));
    }

    #[tokio::test]
    async fn test_translation_pipeline() {
        let criteria_model = Arc::new(ScriptedModel::replying(&["  Price_to_Earnings_Ratio_(TTM) < 15 \n"]));
        let sql_model = Arc::new(ScriptedModel::replying(&[
            "```sql\nSELECT \"Symbol\" FROM stocks WHERE \"Price_to_Earnings_Ratio_(TTM)\" < 15;\n```",
        ]));
        let translator = QueryTranslator::new(criteria_model.clone(), sql_model.clone());

        let criteria = translator.extract_criteria("cheap stocks, P/E under 15").await.unwrap();
        assert_eq!(criteria, "Price_to_Earnings_Ratio_(TTM) < 15");
        assert!(criteria_model.prompt(0).unwrap().contains("User Query: cheap stocks, P/E under 15"));

        let sql = translator.generate_sql(&criteria, &columns(&["Symbol"])).await.unwrap();
        assert_eq!(sql, "SELECT \"Symbol\" FROM stocks WHERE \"Price_to_Earnings_Ratio_(TTM)\" < 15;");
    }
}
