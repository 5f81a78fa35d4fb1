//! Tabular query results

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Materialized result of a SQL statement.
///
/// Column order is the result schema order; every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Render as a markdown pipe table: header, separator, then one line per row
    pub fn to_markdown(&self) -> String {
        if self.columns.is_empty() {
            return "(no columns)".to_string();
        }

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(markdown_row(self.columns.iter().map(|c| escape_cell(c))));
        lines.push(markdown_row(self.columns.iter().map(|_| "---".to_string())));
        for row in &self.rows {
            let cells = (0..self.columns.len())
                .map(|i| row.get(i).map(format_cell).unwrap_or_default());
            lines.push(markdown_row(cells));
        }
        lines.join("\n")
    }
}

fn markdown_row(cells: impl Iterator<Item = String>) -> String {
    let inner: Vec<String> = cells.collect();
    format!("| {} |", inner.join(" | "))
}

fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => escape_cell(s),
        other => escape_cell(&other.to_string()),
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}
