use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub column_type: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnInfo>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Exact name match first, then case-insensitive.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn first_value(&self, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.first()?.get(idx)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawColumn {
    #[serde(rename = "ColumnName")]
    name: String,
    #[serde(rename = "DataType", default)]
    data_type: Option<String>,
    #[serde(rename = "ColumnType", default)]
    column_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(rename = "Columns", default)]
    columns: Vec<RawColumn>,
    #[serde(rename = "Rows", default)]
    rows: Vec<Vec<Value>>,
}

/// Body of a v1 REST response: `{"Tables": [{"Columns": [...], "Rows": [...]}]}`.
#[derive(Debug, Deserialize)]
pub struct RestResponse {
    #[serde(rename = "Tables", default)]
    tables: Vec<RawTable>,
}

impl RestResponse {
    pub fn into_primary(self) -> Option<QueryResult> {
        let table = self.tables.into_iter().next()?;
        let columns = table
            .columns
            .into_iter()
            .map(|c| ColumnInfo {
                column_type: c
                    .column_type
                    .or(c.data_type)
                    .unwrap_or_else(|| "string".to_string()),
                name: c.name,
            })
            .collect();
        Some(QueryResult::new(columns, table.rows))
    }
}
