//! Screener dataset
//!
//! The stock CSV is loaded once into an in-memory SQLite table `stocks`.
//! Column types are inferred from the cells, so numeric criteria compare
//! numerically. Generated queries run inside a transaction that is always
//! rolled back: the table looks the same to every request.

use crate::error::AssistantError;
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, info};

pub const TABLE_NAME: &str = "stocks";

/// Cells read as missing values
const NA_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "#N/A", "NaN", "nan", "-NaN", "null", "NULL", "None",
];

/// Normalize CSV headers into SQL-friendly names.
///
/// Trims, replaces `.` and spaces with `_`, then suffixes case-insensitive
/// duplicates with `_1`, `_2`, ...
pub fn clean_column_names<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();

    headers
        .iter()
        .map(|raw| {
            let normalized = raw.as_ref().trim().replace(['.', ' '], "_");
            let key = normalized.to_lowercase();

            match seen.get_mut(&key) {
                Some(count) => {
                    *count += 1;
                    format!("{}_{}", normalized, count)
                }
                None => {
                    seen.insert(key, 0);
                    normalized
                }
            }
        })
        .collect()
}

/// SQLite storage class chosen for a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    /// Narrowest type that fits every non-missing cell
    pub fn infer<'a>(cells: impl IntoIterator<Item = &'a str>) -> Self {
        let mut inferred = ColumnType::Integer;

        for cell in cells.into_iter().map(str::trim).filter(|c| !is_missing(c)) {
            if inferred == ColumnType::Integer && cell.parse::<i64>().is_err() {
                inferred = ColumnType::Real;
            }
            if inferred == ColumnType::Real && cell.parse::<f64>().is_err() {
                return ColumnType::Text;
            }
        }

        inferred
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

fn is_missing(cell: &str) -> bool {
    NA_MARKERS.contains(&cell)
}

/// Quote an identifier for SQLite
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// The loaded stock table
pub struct StockDataset {
    pool: SqlitePool,
    columns: Vec<String>,
    row_count: usize,
}

impl std::fmt::Debug for StockDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockDataset")
            .field("columns", &self.columns.len())
            .field("row_count", &self.row_count)
            .finish()
    }
}

impl StockDataset {
    pub async fn from_csv_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        info!("Loading stock data from {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| {
            AssistantError::DatasetError(format!("Cannot open {}: {}", path.display(), e))
        })?;
        Self::from_reader(file).await
    }

    pub async fn from_reader<R: io::Read>(reader: R) -> crate::Result<Self> {
        let (columns, records) = read_csv(reader)?;

        let types: Vec<ColumnType> = (0..columns.len())
            .map(|idx| ColumnType::infer(records.iter().map(|r| r.get(idx).unwrap_or(""))))
            .collect();

        // A single connection keeps the in-memory database alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        create_table(&pool, &columns, &types).await?;
        insert_rows(&pool, &columns, &types, &records).await?;

        info!("Loaded {} stocks with {} metrics", records.len(), columns.len());

        Ok(Self {
            pool,
            columns,
            row_count: records.len(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Run a query and return rows as JSON objects in column order
    pub async fn execute(&self, sql: &str) -> crate::Result<Vec<Map<String, Value>>> {
        debug!("Executing SQL: {}", sql);

        let mut tx = self.pool.begin().await?;
        let fetched = sqlx::query(sql).fetch_all(&mut *tx).await;
        tx.rollback().await?;

        let rows = fetched.map_err(|e| AssistantError::SqlError(e.to_string()))?;
        rows.iter().map(row_to_json).collect()
    }
}

fn read_csv<R: io::Read>(reader: R) -> crate::Result<(Vec<String>, Vec<csv::StringRecord>)> {
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(AssistantError::DatasetError("CSV has no header row".to_string()));
    }

    let records = csv_reader
        .records()
        .collect::<std::result::Result<Vec<_>, csv::Error>>()?;

    Ok((clean_column_names(&headers), records))
}

async fn create_table(pool: &SqlitePool, columns: &[String], types: &[ColumnType]) -> crate::Result<()> {
    let definitions: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(name, ty)| format!("{} {}", quote_ident(name), ty.sql_name()))
        .collect();

    let ddl = format!("CREATE TABLE {} ({})", TABLE_NAME, definitions.join(", "));
    sqlx::query(&ddl).execute(pool).await?;
    Ok(())
}

async fn insert_rows(
    pool: &SqlitePool,
    columns: &[String],
    types: &[ColumnType],
    records: &[csv::StringRecord],
) -> crate::Result<()> {
    let placeholders = vec!["?"; columns.len()].join(", ");
    let column_list: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        TABLE_NAME,
        column_list.join(", "),
        placeholders
    );

    let mut tx = pool.begin().await?;

    for record in records {
        let mut query = sqlx::query(&insert);

        for (idx, ty) in types.iter().enumerate() {
            let cell = record.get(idx).map(str::trim).filter(|c| !is_missing(c));

            query = match (cell, ty) {
                (None, _) => query.bind(None::<String>),
                (Some(c), ColumnType::Integer) => query.bind(c.parse::<i64>().ok()),
                (Some(c), ColumnType::Real) => query.bind(c.parse::<f64>().ok()),
                (Some(c), ColumnType::Text) => query.bind(c.to_string()),
            };
        }

        query.execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(())
}

fn row_to_json(row: &SqliteRow) -> crate::Result<Map<String, Value>> {
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let idx = column.ordinal();
        let raw = row.try_get_raw(idx)?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
                // Non-finite floats have no JSON form
                "REAL" => Number::from_f64(row.try_get::<f64, _>(idx)?)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                "BLOB" => Value::String(String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(idx)?).into_owned()),
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };

        object.insert(column.name().to_string(), value);
    }

    Ok(object)
}
