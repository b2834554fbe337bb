//! Database execution engine for noqli.
//!
//! [`TabularStore`] is everything the shell needs from a backing store.
//! [`MySqlStore`] implements it over a sqlx MySQL pool.

use crate::ast::{ColumnInfo, Scalar, Statement, TableRef};
use crate::error::{NoqliError, NoqliResult};
use crate::transpiler::add_column;

use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo};
use tracing::{debug, info};

/// Rows returned by a SELECT, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as JSON objects keyed by column name.
    pub fn records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(map)
            })
            .collect()
    }
}

/// Outcome of an INSERT, UPDATE, DELETE or DDL statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: u64,
}

/// The backing store as seen by the shell.
#[allow(async_fn_in_trait)]
pub trait TabularStore {
    /// Columns of a table in ordinal order.
    async fn list_columns(&self, table: &TableRef) -> NoqliResult<Vec<ColumnInfo>>;

    /// Create a loosely typed column if it is missing. Returns whether it
    /// was created.
    async fn ensure_column(&self, table: &TableRef, column: &str) -> NoqliResult<bool>;

    async fn fetch(&self, stmt: &Statement) -> NoqliResult<ResultSet>;

    async fn execute(&self, stmt: &Statement) -> NoqliResult<ExecResult>;

    async fn list_databases(&self) -> NoqliResult<Vec<String>>;

    async fn list_tables(&self, database: &str) -> NoqliResult<Vec<String>>;

    async fn database_exists(&self, database: &str) -> NoqliResult<bool>;

    async fn table_exists(&self, database: &str, table: &str) -> NoqliResult<bool>;
}

/// A MySQL connection pool.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Open a pool with the given options.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let options = "mysql://root@localhost/app".parse()?;
    /// let store = MySqlStore::connect(options).await?;
    /// ```
    pub async fn connect(options: MySqlConnectOptions) -> NoqliResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| NoqliError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn names(&self, sql: &str, params: Vec<Scalar>) -> NoqliResult<Vec<String>> {
        let stmt = Statement::new(sql, params);
        let rows = bind_all(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NoqliError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map_err(|e| NoqliError::Database(e.to_string()))
            })
            .collect()
    }

    async fn exists(&self, sql: &str, params: Vec<Scalar>) -> NoqliResult<bool> {
        let stmt = Statement::new(sql, params);
        let row = bind_all(&stmt)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| NoqliError::Database(e.to_string()))?;

        let n: i64 = row
            .try_get(0)
            .map_err(|e| NoqliError::Database(e.to_string()))?;
        Ok(n > 0)
    }
}

impl TabularStore for MySqlStore {
    async fn list_columns(&self, table: &TableRef) -> NoqliResult<Vec<ColumnInfo>> {
        let stmt = Statement::new(
            "SELECT CAST(COLUMN_NAME AS CHAR), CAST(DATA_TYPE AS CHAR) \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ? \
             ORDER BY ORDINAL_POSITION",
            vec![
                table
                    .database
                    .clone()
                    .map(Scalar::Text)
                    .unwrap_or(Scalar::Null),
                Scalar::Text(table.table.clone()),
            ],
        );

        let rows = bind_all(&stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NoqliError::Database(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let name: String = row
                    .try_get(0)
                    .map_err(|e| NoqliError::Database(e.to_string()))?;
                let data_type: String = row
                    .try_get(1)
                    .map_err(|e| NoqliError::Database(e.to_string()))?;
                Ok(ColumnInfo::new(name, is_text_type(&data_type)))
            })
            .collect()
    }

    async fn ensure_column(&self, table: &TableRef, column: &str) -> NoqliResult<bool> {
        let columns = self.list_columns(table).await?;
        if columns.iter().any(|c| c.name == column) {
            return Ok(false);
        }

        self.execute(&add_column(table, column)).await?;
        info!(table = %table.table, column, "added column");
        Ok(true)
    }

    async fn fetch(&self, stmt: &Statement) -> NoqliResult<ResultSet> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "fetch");

        let rows: Vec<MySqlRow> = bind_all(stmt)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| NoqliError::Execution(e.to_string()))?;

        let columns = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };

        Ok(ResultSet {
            columns,
            rows: rows.iter().map(row_to_values).collect(),
        })
    }

    async fn execute(&self, stmt: &Statement) -> NoqliResult<ExecResult> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "execute");

        let result = bind_all(stmt)
            .execute(&self.pool)
            .await
            .map_err(|e| NoqliError::Execution(e.to_string()))?;

        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }

    async fn list_databases(&self) -> NoqliResult<Vec<String>> {
        self.names(
            "SELECT CAST(SCHEMA_NAME AS CHAR) FROM INFORMATION_SCHEMA.SCHEMATA ORDER BY SCHEMA_NAME",
            Vec::new(),
        )
        .await
    }

    async fn list_tables(&self, database: &str) -> NoqliResult<Vec<String>> {
        self.names(
            "SELECT CAST(TABLE_NAME AS CHAR) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME",
            vec![database.into()],
        )
        .await
    }

    async fn database_exists(&self, database: &str) -> NoqliResult<bool> {
        self.exists(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = ?",
            vec![database.into()],
        )
        .await
    }

    async fn table_exists(&self, database: &str, table: &str) -> NoqliResult<bool> {
        self.exists(
            "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
            vec![database.into(), table.into()],
        )
        .await
    }
}

/// Build a sqlx query with every parameter bound in order.
fn bind_all(stmt: &Statement) -> Query<'_, MySql, MySqlArguments> {
    let mut query = sqlx::query(&stmt.sql);

    for param in &stmt.params {
        query = match param {
            Scalar::Null => query.bind(None::<String>),
            Scalar::Bool(v) => query.bind(*v),
            Scalar::Int(v) => query.bind(*v),
            Scalar::Float(v) => query.bind(*v),
            Scalar::Text(v) => query.bind(v.as_str()),
        };
    }

    query
}

/// MySQL `DATA_TYPE` values searched by LIKE.
fn is_text_type(data_type: &str) -> bool {
    matches!(
        data_type.to_ascii_lowercase().as_str(),
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set"
    )
}

fn decode<'r, T>(row: &'r MySqlRow, i: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<Option<T>, _>(i).ok().flatten()
}

/// Convert a MySqlRow to JSON values in column order.
fn row_to_values(row: &MySqlRow) -> Vec<Value> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let type_name = column.type_info().name();

            let value = match type_name {
                "NULL" => None,
                "BOOLEAN" => decode::<bool>(row, i).map(Value::Bool),
                t if t.contains("INT") && t.ends_with("UNSIGNED") => {
                    decode::<u64>(row, i).map(Value::from)
                }
                t if t.contains("INT") => decode::<i64>(row, i).map(Value::from),
                "FLOAT" => decode::<f32>(row, i)
                    .and_then(|v| serde_json::Number::from_f64(v as f64))
                    .map(Value::Number),
                "DOUBLE" => decode::<f64>(row, i)
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                "DATETIME" | "TIMESTAMP" => decode::<chrono::NaiveDateTime>(row, i)
                    .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string())),
                "DATE" => decode::<chrono::NaiveDate>(row, i).map(|v| Value::String(v.to_string())),
                "TIME" => decode::<chrono::NaiveTime>(row, i).map(|v| Value::String(v.to_string())),
                _ => decode::<String>(row, i)
                    .or_else(|| row.try_get_unchecked::<Option<String>, _>(i).ok().flatten())
                    .map(Value::String),
            };

            value.unwrap_or(Value::Null)
        })
        .collect()
}
