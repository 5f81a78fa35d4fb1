//! Local SQLite backend
//!
//! Useful for running the chat service against a demo dataset without a
//! Snowflake warehouse.

use super::{QueryResult, Warehouse, WarehouseError};
use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe SQLite warehouse handle
#[derive(Clone)]
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWarehouse {
    /// Open or create a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, WarehouseError> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run setup SQL (DDL, seed data)
    #[allow(dead_code)] // Used in tests
    pub fn execute_batch(&self, sql: &str) -> Result<(), WarehouseError> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(sql)?;
        Ok(())
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn execute(&self, sql: &str) -> Result<QueryResult, WarehouseError> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || run_query(&conn, &sql))
            .await
            .map_err(|e| WarehouseError::Request(format!("Query task failed: {e}")))?
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

fn lock(conn: &Mutex<Connection>) -> Result<std::sync::MutexGuard<'_, Connection>, WarehouseError> {
    conn.lock()
        .map_err(|_| WarehouseError::Request("SQLite connection lock poisoned".into()))
}

fn run_query(conn: &Mutex<Connection>, sql: &str) -> Result<QueryResult, WarehouseError> {
    let conn = lock(conn)?;
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(to_json(row.get_ref(i)?));
        }
        rows.push(cells);
    }

    Ok(QueryResult::new(columns, rows))
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}
