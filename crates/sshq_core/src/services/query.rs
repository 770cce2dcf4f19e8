//! Query execution.
//!
//! Runs the one query and streams its rows into a [`TableWriter`]:
//! - `QueryMode::Text` uses the text protocol, every value arrives as bytes
//! - `QueryMode::Typed` uses the binary protocol, so numeric and temporal
//!   columns arrive natively and fail coercion with the column named

use crate::error::{SshqError, SshqResult};
use crate::models::{ColumnInfo, QueryMode, QuerySummary, RawValue};
use crate::render::TableWriter;
use crate::services::connection::DatabaseConnection;

use async_trait::async_trait;
use mysql_async::prelude::{Protocol, Queryable};
use mysql_async::{Column, Params, QueryResult, Value};
use std::io::Write;
use std::time::Instant;

/// A server response being read one row at a time.
#[async_trait]
pub trait ResultSet: Send {
    /// Columns of the current result set; `None` or empty for statements
    /// without rows.
    fn columns(&self) -> Option<Vec<ColumnInfo>>;

    /// Next row of the current result set.
    async fn next_row(&mut self) -> SshqResult<Option<Vec<Value>>>;

    /// Rows affected as reported by the server.
    fn affected_rows(&self) -> u64;

    /// Whether another result set follows the current one.
    fn has_more_sets(&self) -> bool;
}

#[async_trait]
impl<'a, P> ResultSet for QueryResult<'a, 'static, P>
where
    P: Protocol + Unpin + Send,
{
    fn columns(&self) -> Option<Vec<ColumnInfo>> {
        QueryResult::columns(self).map(|columns| {
            columns
                .iter()
                .map(|c| ColumnInfo::new(c.name_str(), column_type_name(c)))
                .collect()
        })
    }

    async fn next_row(&mut self) -> SshqResult<Option<Vec<Value>>> {
        let row = self.next().await?;
        Ok(row.map(|row| {
            row.unwrap_raw().into_iter().map(|v| v.unwrap_or(Value::NULL)).collect()
        }))
    }

    fn affected_rows(&self) -> u64 {
        QueryResult::affected_rows(self)
    }

    fn has_more_sets(&self) -> bool {
        !self.is_empty()
    }
}

/// Service for executing the query.
pub struct QueryService;

impl QueryService {
    /// Execute `sql` on `conn` and feed the result set to `table`.
    pub async fn execute<W: Write>(
        conn: &mut DatabaseConnection,
        sql: &str,
        mode: QueryMode,
        table: &mut TableWriter<W>,
    ) -> SshqResult<QuerySummary> {
        let start = Instant::now();
        tracing::debug!(mode = mode.as_str(), sql_len = sql.len(), "Executing query");

        let result = async {
            match mode {
                QueryMode::Text => {
                    let result = conn.conn_mut().query_iter(sql).await?;
                    Self::render_results(result, table).await
                }
                QueryMode::Typed => {
                    let result = conn.conn_mut().exec_iter(sql, Params::Empty).await?;
                    Self::render_results(result, table).await
                }
            }
        }
        .await;

        let mut summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(category = e.category(), error = %e, "Query failed");
                return Err(e);
            }
        };
        summary.execution_time_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            execution_time_ms = summary.execution_time_ms,
            row_count = summary.row_count,
            rows_affected = summary.rows_affected,
            "Query completed"
        );

        Ok(summary)
    }

    /// Drain one result set into `table`. A second result set is an error.
    pub async fn render_results<R, W>(
        mut result: R,
        table: &mut TableWriter<W>,
    ) -> SshqResult<QuerySummary>
    where
        R: ResultSet,
        W: Write,
    {
        let mut summary = QuerySummary {
            columns: result.columns().unwrap_or_default(),
            ..QuerySummary::default()
        };
        if summary.has_result_set() {
            table.write_header(&summary.column_names())?;
        }

        while let Some(values) = result.next_row().await? {
            table.write_row(coerce_row(&summary.columns, &values)?)?;
            summary.row_count += 1;
        }
        summary.rows_affected = result.affected_rows();

        if result.has_more_sets() {
            return Err(multiple_result_sets());
        }
        Ok(summary)
    }
}

/// Coerce one row's values to display text, naming the column on failure.
pub fn coerce_row(columns: &[ColumnInfo], values: &[Value]) -> SshqResult<Vec<String>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let (name, type_name) =
                columns.get(i).map_or(("?", "?"), |c| (c.name.as_str(), c.type_name.as_str()));
            RawValue::from_wire(value, type_name).coerce(name)
        })
        .collect()
}

/// `MYSQL_TYPE_LONG` -> `long`.
fn column_type_name(column: &Column) -> String {
    let raw = format!("{:?}", column.column_type());
    raw.strip_prefix("MYSQL_TYPE_").unwrap_or(&raw).to_ascii_lowercase()
}

fn multiple_result_sets() -> SshqError {
    SshqError::query(
        "The query returned more than one result set",
        Some("Run a single statement per invocation".to_string()),
    )
}
