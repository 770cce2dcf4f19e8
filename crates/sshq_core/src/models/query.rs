//! Query execution models.

/// Column metadata from a result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Server type name, lowercased without the `MYSQL_TYPE_` prefix
    pub type_name: String,
}

impl ColumnInfo {
    /// Create column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self { name: name.into(), type_name: type_name.into() }
    }
}

/// Outcome of running the one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySummary {
    /// Columns of the result set; empty for statements without rows
    pub columns: Vec<ColumnInfo>,
    /// Number of data rows rendered
    pub row_count: u64,
    /// Rows affected as reported in the server's OK packet
    pub rows_affected: u64,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl QuerySummary {
    /// Whether the statement produced a result set.
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}
