//! SQLite-backed print queue store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::db;

use super::{
    NewPrintItem, PrintQueueError, PrintQueueFilter, PrintQueueItem, PrintQueueStore, PrintStatus,
};

const COLUMNS: &str = "id, label_id, order_id, order_code, file_name, file_path, status, attempts, max_attempts, last_error, printer, copies, claimed_by, created_at, claimed_at, printed_at";

pub struct SqlitePrintQueueStore {
    conn: Mutex<Connection>,
}

impl SqlitePrintQueueStore {
    pub fn new(path: &Path) -> Result<Self, PrintQueueError> {
        let conn = db::open(path).map_err(|e| PrintQueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PrintQueueError> {
        let conn =
            db::open_in_memory().map_err(|e| PrintQueueError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PrintQueueError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS print_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label_id INTEGER NOT NULL,
                order_id INTEGER,
                order_code TEXT,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                last_error TEXT,
                printer TEXT,
                copies INTEGER NOT NULL DEFAULT 1,
                claimed_by TEXT,
                created_at TEXT NOT NULL,
                claimed_at TEXT,
                printed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_print_queue_status ON print_queue(status, created_at);
            CREATE INDEX IF NOT EXISTS idx_print_queue_label ON print_queue(label_id);
            "#,
        )
        .map_err(|e| PrintQueueError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PrintQueueError> {
        self.conn
            .lock()
            .map_err(|_| PrintQueueError::Database("connection lock poisoned".to_string()))
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<PrintQueueItem>, PrintQueueError> {
        conn.query_row(
            &format!("SELECT {} FROM print_queue WHERE id = ?", COLUMNS),
            params![id],
            row_to_item,
        )
        .optional()
        .map_err(|e| PrintQueueError::Database(e.to_string()))
    }

    /// Run a conditional update and return the item, or explain why it did
    /// not apply.
    fn transition(
        &self,
        id: i64,
        operation: &'static str,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<PrintQueueItem, PrintQueueError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(sql, params)
            .map_err(|e| PrintQueueError::Database(e.to_string()))?;
        let item = Self::fetch(&conn, id)?.ok_or(PrintQueueError::NotFound(id))?;
        if changed == 0 {
            return Err(PrintQueueError::InvalidState {
                id,
                status: item.status,
                operation,
            });
        }
        Ok(item)
    }

    fn query_list(
        conn: &Connection,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<PrintQueueItem>, PrintQueueError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| PrintQueueError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params, row_to_item)
            .map_err(|e| PrintQueueError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PrintQueueError::Database(e.to_string()))
    }
}

impl PrintQueueStore for SqlitePrintQueueStore {
    fn insert(&self, new: &NewPrintItem) -> Result<PrintQueueItem, PrintQueueError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO print_queue (label_id, order_id, order_code, file_name, file_path, status, attempts, max_attempts, printer, copies, created_at)
             VALUES (?, ?, ?, ?, ?, 'pending', 0, ?, ?, ?, ?)",
            params![
                new.label_id,
                new.order_id,
                new.order_code,
                new.file_name,
                new.file_path,
                new.max_attempts,
                new.printer,
                new.copies,
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| PrintQueueError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        Self::fetch(&conn, id)?.ok_or(PrintQueueError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<Option<PrintQueueItem>, PrintQueueError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn list_pending(&self, limit: u32) -> Result<Vec<PrintQueueItem>, PrintQueueError> {
        let conn = self.lock()?;
        Self::query_list(
            &conn,
            &format!(
                "SELECT {} FROM print_queue WHERE status = 'pending' ORDER BY created_at ASC, id ASC LIMIT ?",
                COLUMNS
            ),
            params![limit as i64],
        )
    }

    fn list(&self, filter: &PrintQueueFilter) -> Result<Vec<PrintQueueItem>, PrintQueueError> {
        let conn = self.lock()?;
        let (where_clause, mut params) = where_clause(filter);
        params.push(Box::new(filter.page_size as i64));
        params.push(Box::new(filter.offset()));

        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Self::query_list(
            &conn,
            &format!(
                "SELECT {} FROM print_queue {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                COLUMNS, where_clause
            ),
            param_refs.as_slice(),
        )
    }

    fn count(&self, filter: &PrintQueueFilter) -> Result<i64, PrintQueueError> {
        let conn = self.lock()?;
        let (where_clause, params) = where_clause(filter);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM print_queue {}", where_clause),
            param_refs.as_slice(),
            |row| row.get(0),
        )
        .map_err(|e| PrintQueueError::Database(e.to_string()))
    }

    fn reserve(&self, id: i64, worker: &str) -> Result<PrintQueueItem, PrintQueueError> {
        self.transition(
            id,
            "reserve",
            "UPDATE print_queue
             SET status = 'in_progress', claimed_by = ?1, claimed_at = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![worker, Utc::now().to_rfc3339(), id],
        )
    }

    fn confirm(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError> {
        self.transition(
            id,
            "confirm",
            "UPDATE print_queue
             SET status = 'printed', printed_at = ?1, last_error = NULL
             WHERE id = ?2 AND status = 'in_progress'",
            params![Utc::now().to_rfc3339(), id],
        )
    }

    fn fail(&self, id: i64, error: &str) -> Result<PrintQueueItem, PrintQueueError> {
        self.transition(
            id,
            "fail",
            "UPDATE print_queue
             SET attempts = attempts + 1,
                 last_error = ?1,
                 status = CASE WHEN attempts + 1 >= max_attempts THEN 'error' ELSE 'pending' END,
                 claimed_by = NULL,
                 claimed_at = NULL
             WHERE id = ?2 AND status IN ('pending', 'in_progress')",
            params![error, id],
        )
    }

    fn cancel(&self, id: i64) -> Result<PrintQueueItem, PrintQueueError> {
        self.transition(
            id,
            "cancel",
            "UPDATE print_queue
             SET status = 'cancelled', claimed_by = NULL
             WHERE id = ?1 AND status IN ('pending', 'in_progress')",
            params![id],
        )
    }
}

fn where_clause(filter: &PrintQueueFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(status) = filter.status {
        conditions.push("status = ?");
        params.push(Box::new(status.as_str().to_string()));
    }
    if let Some(label_id) = filter.label_id {
        conditions.push("label_id = ?");
        params.push(Box::new(label_id));
    }
    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<PrintQueueItem> {
    let status: String = row.get(6)?;
    let status = PrintStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown print status: {}", status).into(),
        )
    })?;

    Ok(PrintQueueItem {
        id: row.get(0)?,
        label_id: row.get(1)?,
        order_id: row.get(2)?,
        order_code: row.get(3)?,
        file_name: row.get(4)?,
        file_path: row.get(5)?,
        status,
        attempts: row.get(7)?,
        max_attempts: row.get(8)?,
        last_error: row.get(9)?,
        printer: row.get(10)?,
        copies: row.get(11)?,
        claimed_by: row.get(12)?,
        created_at: db::timestamp(row, 13)?,
        claimed_at: db::opt_timestamp(row, 14)?,
        printed_at: db::opt_timestamp(row, 15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_item(label_id: i64, max_attempts: u32) -> NewPrintItem {
        NewPrintItem {
            label_id,
            order_id: Some(1001),
            order_code: Some("PED-1001".to_string()),
            file_name: "label_order_1001_R1.pdf".to_string(),
            file_path: "/rotulos/label_order_1001_R1.pdf".to_string(),
            max_attempts,
            printer: None,
            copies: 1,
        }
    }

    #[test]
    fn test_insert_starts_pending() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let item = store.insert(&new_item(1, 3)).unwrap();
        assert_eq!(item.status, PrintStatus::Pending);
        assert_eq!(item.attempts, 0);
        assert_eq!(store.get(item.id).unwrap(), Some(item));
    }

    #[test]
    fn test_reserve_is_exclusive() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let item = store.insert(&new_item(1, 3)).unwrap();

        let claimed = store.reserve(item.id, "printer-a").unwrap();
        assert_eq!(claimed.status, PrintStatus::InProgress);
        assert_eq!(claimed.claimed_by.as_deref(), Some("printer-a"));
        assert!(claimed.claimed_at.is_some());

        let err = store.reserve(item.id, "printer-b").unwrap_err();
        assert!(matches!(
            err,
            PrintQueueError::InvalidState {
                status: PrintStatus::InProgress,
                operation: "reserve",
                ..
            }
        ));
        assert!(matches!(
            store.reserve(99, "printer-b").unwrap_err(),
            PrintQueueError::NotFound(99)
        ));
    }

    #[test]
    fn test_confirm_requires_in_progress() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let item = store.insert(&new_item(1, 3)).unwrap();
        assert!(store.confirm(item.id).is_err());

        store.reserve(item.id, "w").unwrap();
        let printed = store.confirm(item.id).unwrap();
        assert_eq!(printed.status, PrintStatus::Printed);
        assert!(printed.printed_at.is_some());
    }

    #[test]
    fn test_fail_retries_until_bound() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let item = store.insert(&new_item(1, 3)).unwrap();

        for attempt in 1..=2 {
            store.reserve(item.id, "w").unwrap();
            let failed = store.fail(item.id, "paper jam").unwrap();
            assert_eq!(failed.status, PrintStatus::Pending);
            assert_eq!(failed.attempts, attempt);
            assert!(failed.claimed_by.is_none());
        }

        store.reserve(item.id, "w").unwrap();
        let exhausted = store.fail(item.id, "paper jam").unwrap();
        assert_eq!(exhausted.status, PrintStatus::Error);
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error.as_deref(), Some("paper jam"));

        assert!(store.list_pending(10).unwrap().is_empty());
        assert!(store.reserve(item.id, "w").is_err());
        assert!(store.fail(item.id, "again").is_err());
    }

    #[test]
    fn test_cancel() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let item = store.insert(&new_item(1, 3)).unwrap();
        let cancelled = store.cancel(item.id).unwrap();
        assert_eq!(cancelled.status, PrintStatus::Cancelled);
        assert!(store.cancel(item.id).is_err());
    }

    #[test]
    fn test_listing_order() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let first = store.insert(&new_item(1, 3)).unwrap();
        let second = store.insert(&new_item(2, 3)).unwrap();
        let third = store.insert(&new_item(3, 3)).unwrap();
        store.reserve(second.id, "w").unwrap();

        let pending: Vec<i64> = store.list_pending(10).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(pending, vec![first.id, third.id]);
        assert_eq!(store.list_pending(1).unwrap().len(), 1);

        let all = store.list(&PrintQueueFilter::default()).unwrap();
        assert_eq!(all[0].id, third.id);

        let in_progress = PrintQueueFilter::default().with_status(PrintStatus::InProgress);
        assert_eq!(store.count(&in_progress).unwrap(), 1);
        assert_eq!(store.count(&PrintQueueFilter::default()).unwrap(), 3);
    }

    #[test]
    fn test_filter_by_label() {
        let store = SqlitePrintQueueStore::in_memory().unwrap();
        let first = store.insert(&new_item(1, 3)).unwrap();
        store.insert(&new_item(2, 3)).unwrap();
        let again = store.insert(&new_item(1, 3)).unwrap();
        store.cancel(first.id).unwrap();

        let for_label = PrintQueueFilter::default().with_label(1);
        let ids: Vec<i64> = store.list(&for_label).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![again.id, first.id]);
        assert_eq!(store.count(&for_label).unwrap(), 2);

        let pending = for_label.with_status(PrintStatus::Pending);
        assert_eq!(store.count(&pending).unwrap(), 1);
        assert_eq!(store.list(&pending).unwrap()[0].id, again.id);
    }
}
