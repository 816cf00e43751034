//! SQLite-backed label store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::db;

use super::{Label, LabelError, LabelFilter, LabelStore, NewLabel};

const COLUMNS: &str = "id, receipt_id, order_id, reception_id, file_name, file_path, generated_at, page_count, tracking_codes, pre_posting_ids, label_type, label_format, size_bytes, notes";

pub struct SqliteLabelStore {
    conn: Mutex<Connection>,
}

impl SqliteLabelStore {
    pub fn new(path: &Path) -> Result<Self, LabelError> {
        let conn = db::open(path).map_err(|e| LabelError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, LabelError> {
        let conn = db::open_in_memory().map_err(|e| LabelError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LabelError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS labels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                receipt_id TEXT NOT NULL UNIQUE,
                order_id INTEGER,
                reception_id TEXT,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                page_count INTEGER NOT NULL,
                tracking_codes TEXT NOT NULL,
                pre_posting_ids TEXT NOT NULL,
                label_type TEXT NOT NULL,
                label_format TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                notes TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_labels_order ON labels(order_id);
            CREATE INDEX IF NOT EXISTS idx_labels_generated ON labels(generated_at);
            "#,
        )
        .map_err(|e| LabelError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LabelError> {
        self.conn
            .lock()
            .map_err(|_| LabelError::Database("connection lock poisoned".to_string()))
    }

    fn fetch_by_receipt(conn: &Connection, receipt_id: &str) -> Result<Option<Label>, LabelError> {
        conn.query_row(
            &format!("SELECT {} FROM labels WHERE receipt_id = ?", COLUMNS),
            params![receipt_id],
            row_to_label,
        )
        .optional()
        .map_err(|e| LabelError::Database(e.to_string()))
    }

    fn build_where_clause(filter: &LabelFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        let clause = match filter.order_id {
            Some(order_id) => {
                params.push(Box::new(order_id));
                "WHERE order_id = ?".to_string()
            }
            None => String::new(),
        };
        (clause, params)
    }
}

impl LabelStore for SqliteLabelStore {
    fn insert_or_get(&self, new: &NewLabel) -> Result<(Label, bool), LabelError> {
        let conn = self.lock()?;

        let tracking_codes = serde_json::to_string(&new.tracking_codes)
            .map_err(|e| LabelError::Database(e.to_string()))?;
        let pre_posting_ids = serde_json::to_string(&new.pre_posting_ids)
            .map_err(|e| LabelError::Database(e.to_string()))?;

        let result = conn.execute(
            "INSERT INTO labels (receipt_id, order_id, reception_id, file_name, file_path, generated_at, page_count, tracking_codes, pre_posting_ids, label_type, label_format, size_bytes, notes)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.receipt_id,
                new.order_id,
                new.reception_id,
                new.file_name,
                new.file_path,
                Utc::now().to_rfc3339(),
                new.page_count,
                tracking_codes,
                pre_posting_ids,
                new.label_type,
                new.label_format,
                new.size_bytes as i64,
                new.notes,
            ],
        );

        // The UNIQUE receipt_id decides which poll stored the label.
        let created = match result {
            Ok(_) => true,
            Err(e) if db::is_unique_violation(&e) => false,
            Err(e) => return Err(LabelError::Database(e.to_string())),
        };

        let label = Self::fetch_by_receipt(&conn, &new.receipt_id)?
            .ok_or_else(|| LabelError::NotFound(new.receipt_id.clone()))?;
        Ok((label, created))
    }

    fn get(&self, id: i64) -> Result<Option<Label>, LabelError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM labels WHERE id = ?", COLUMNS),
            params![id],
            row_to_label,
        )
        .optional()
        .map_err(|e| LabelError::Database(e.to_string()))
    }

    fn get_by_receipt(&self, receipt_id: &str) -> Result<Option<Label>, LabelError> {
        let conn = self.lock()?;
        Self::fetch_by_receipt(&conn, receipt_id)
    }

    fn list(&self, filter: &LabelFilter) -> Result<Vec<Label>, LabelError> {
        let conn = self.lock()?;
        let (where_clause, mut params) = Self::build_where_clause(filter);
        params.push(Box::new(filter.page_size as i64));
        params.push(Box::new(filter.offset()));

        let sql = format!(
            "SELECT {} FROM labels {} ORDER BY generated_at DESC, id DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| LabelError::Database(e.to_string()))?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_label)
            .map_err(|e| LabelError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| LabelError::Database(e.to_string()))
    }

    fn count(&self, filter: &LabelFilter) -> Result<i64, LabelError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM labels {}", where_clause),
            param_refs.as_slice(),
            |row| row.get(0),
        )
        .map_err(|e| LabelError::Database(e.to_string()))
    }

    fn delete(&self, id: i64) -> Result<bool, LabelError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM labels WHERE id = ?", params![id])
            .map_err(|e| LabelError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }
}

fn json_list(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_label(row: &rusqlite::Row) -> rusqlite::Result<Label> {
    let size_bytes: i64 = row.get(12)?;
    Ok(Label {
        id: row.get(0)?,
        receipt_id: row.get(1)?,
        order_id: row.get(2)?,
        reception_id: row.get(3)?,
        file_name: row.get(4)?,
        file_path: row.get(5)?,
        generated_at: db::timestamp(row, 6)?,
        page_count: row.get(7)?,
        tracking_codes: json_list(row, 8)?,
        pre_posting_ids: json_list(row, 9)?,
        label_type: row.get(10)?,
        label_format: row.get(11)?,
        size_bytes: size_bytes.max(0) as u64,
        notes: row.get(13)?,
    })
}
