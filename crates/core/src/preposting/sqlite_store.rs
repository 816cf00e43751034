//! SQLite-backed pre-posting store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, ToSql};

use crate::db;

use super::{
    NewPrePosting, PrePosting, PrePostingError, PrePostingFilter, PrePostingStatus,
    PrePostingStore, StatusUpdate,
};

const COLUMNS: &str = "id, order_id, carrier_id, tracking_code, label_number, service_code, service_name, weight_kg, height_cm, width_cm, length_cm, declared_value, status, created_at, posted_at, delivered_at, posting_deadline, notes, error_message, carrier_response";

/// SQLite-backed pre-posting store.
pub struct SqlitePrePostingStore {
    conn: Mutex<Connection>,
}

impl SqlitePrePostingStore {
    pub fn new(path: &Path) -> Result<Self, PrePostingError> {
        let conn = db::open(path).map_err(|e| PrePostingError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PrePostingError> {
        let conn = db::open_in_memory().map_err(|e| PrePostingError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PrePostingError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS pre_postings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_id INTEGER NOT NULL,
                carrier_id TEXT,
                tracking_code TEXT,
                label_number TEXT,
                service_code TEXT NOT NULL,
                service_name TEXT NOT NULL,
                weight_kg TEXT NOT NULL,
                height_cm INTEGER NOT NULL,
                width_cm INTEGER NOT NULL,
                length_cm INTEGER NOT NULL,
                declared_value TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                posted_at TEXT,
                delivered_at TEXT,
                posting_deadline TEXT,
                notes TEXT,
                error_message TEXT,
                carrier_response TEXT
            );

            -- At most one live pre-posting per order
            CREATE UNIQUE INDEX IF NOT EXISTS idx_pre_postings_active_order
                ON pre_postings(order_id) WHERE status NOT IN ('cancelled', 'error');

            CREATE INDEX IF NOT EXISTS idx_pre_postings_status ON pre_postings(status);
            CREATE INDEX IF NOT EXISTS idx_pre_postings_created ON pre_postings(created_at);
            CREATE INDEX IF NOT EXISTS idx_pre_postings_tracking ON pre_postings(tracking_code);
            "#,
        )
        .map_err(|e| PrePostingError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, PrePostingError> {
        self.conn
            .lock()
            .map_err(|_| PrePostingError::Database("connection lock poisoned".to_string()))
    }

    fn build_where_clause(filter: &PrePostingFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(order_id) = filter.order_id {
            conditions.push("order_id = ?");
            params.push(Box::new(order_id));
        }
        if let Some(from) = filter.created_from {
            conditions.push("created_at >= ?");
            params.push(Box::new(from.to_rfc3339()));
        }
        if let Some(to) = filter.created_to {
            conditions.push("created_at <= ?");
            params.push(Box::new(to.to_rfc3339()));
        }

        let clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };
        (clause, params)
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        conn.query_row(
            &format!("SELECT {} FROM pre_postings WHERE id = ?", COLUMNS),
            params![id],
            row_to_pre_posting,
        )
        .optional()
        .map_err(|e| PrePostingError::Database(e.to_string()))
    }

    fn query_one(
        &self,
        condition: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<PrePosting>, PrePostingError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM pre_postings WHERE {} ORDER BY created_at DESC, id DESC LIMIT 1",
                COLUMNS, condition
            ),
            params,
            row_to_pre_posting,
        )
        .optional()
        .map_err(|e| PrePostingError::Database(e.to_string()))
    }
}

impl PrePostingStore for SqlitePrePostingStore {
    fn insert(&self, new: &NewPrePosting) -> Result<PrePosting, PrePostingError> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO pre_postings (order_id, carrier_id, tracking_code, label_number, service_code, service_name, weight_kg, height_cm, width_cm, length_cm, declared_value, status, created_at, posting_deadline, notes, carrier_response)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                new.order_id,
                new.carrier_id,
                new.tracking_code,
                new.label_number,
                new.service_code,
                new.service_name,
                new.package.weight_kg.to_string(),
                new.package.height_cm,
                new.package.width_cm,
                new.package.length_cm,
                new.declared_value.map(|v| v.to_string()),
                new.status.as_str(),
                now,
                new.posting_deadline.map(|d| d.to_rfc3339()),
                new.notes,
                new.carrier_response,
            ],
        );

        match result {
            Ok(_) => {}
            Err(e) if db::is_unique_violation(&e) => {
                return Err(PrePostingError::AlreadyActive(new.order_id));
            }
            Err(e) => return Err(PrePostingError::Database(e.to_string())),
        }

        let id = conn.last_insert_rowid();
        Self::fetch(&conn, id)?.ok_or(PrePostingError::NotFound(id))
    }

    fn get(&self, id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn find_active_for_order(&self, order_id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        self.query_one(
            "order_id = ? AND status NOT IN ('cancelled', 'error')",
            params![order_id],
        )
    }

    fn latest_for_order(&self, order_id: i64) -> Result<Option<PrePosting>, PrePostingError> {
        self.query_one("order_id = ?", params![order_id])
    }

    fn find_for_order_with_status(
        &self,
        order_id: i64,
        status: PrePostingStatus,
    ) -> Result<Option<PrePosting>, PrePostingError> {
        self.query_one(
            "order_id = ? AND status = ?",
            params![order_id, status.as_str()],
        )
    }

    fn list(&self, filter: &PrePostingFilter) -> Result<Vec<PrePosting>, PrePostingError> {
        let conn = self.lock()?;
        let (where_clause, mut params) = Self::build_where_clause(filter);
        params.push(Box::new(filter.page_size as i64));
        params.push(Box::new(filter.offset()));

        let sql = format!(
            "SELECT {} FROM pre_postings {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            COLUMNS, where_clause
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| PrePostingError::Database(e.to_string()))?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_pre_posting)
            .map_err(|e| PrePostingError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PrePostingError::Database(e.to_string()))
    }

    fn count(&self, filter: &PrePostingFilter) -> Result<i64, PrePostingError> {
        let conn = self.lock()?;
        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM pre_postings {}", where_clause);
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| PrePostingError::Database(e.to_string()))
    }

    fn list_open(&self) -> Result<Vec<PrePosting>, PrePostingError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM pre_postings
                 WHERE tracking_code IS NOT NULL AND tracking_code != ''
                   AND status IN ('generated', 'posted', 'in_transit')
                 ORDER BY id",
                COLUMNS
            ))
            .map_err(|e| PrePostingError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], row_to_pre_posting)
            .map_err(|e| PrePostingError::Database(e.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| PrePostingError::Database(e.to_string()))
    }

    fn mark_cancelled(&self, id: i64, note: &str) -> Result<PrePosting, PrePostingError> {
        let conn = self.lock()?;
        let current = Self::fetch(&conn, id)?.ok_or(PrePostingError::NotFound(id))?;
        if !current.status.can_cancel() {
            return Err(PrePostingError::InvalidState {
                id,
                status: current.status,
                operation: "cancel",
            });
        }

        conn.execute(
            "UPDATE pre_postings
             SET status = 'cancelled',
                 notes = CASE WHEN notes IS NULL OR notes = '' THEN ?1 ELSE notes || char(10) || ?1 END
             WHERE id = ?2 AND status IN ('pending', 'generated')",
            params![note, id],
        )
        .map_err(|e| PrePostingError::Database(e.to_string()))?;

        Self::fetch(&conn, id)?.ok_or(PrePostingError::NotFound(id))
    }

    fn apply_status_updates(&self, updates: &[StatusUpdate]) -> Result<usize, PrePostingError> {
        if updates.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| PrePostingError::Database(e.to_string()))?;

        let mut changed = 0;
        {
            let mut stmt = tx
                .prepare(
                    "UPDATE pre_postings
                     SET status = ?1,
                         posted_at = COALESCE(?2, posted_at),
                         delivered_at = COALESCE(?3, delivered_at)
                     WHERE id = ?4 AND status NOT IN ('cancelled', 'error')",
                )
                .map_err(|e| PrePostingError::Database(e.to_string()))?;
            for update in updates {
                changed += stmt
                    .execute(params![
                        update.status.as_str(),
                        update.posted_at.map(|d| d.to_rfc3339()),
                        update.delivered_at.map(|d| d.to_rfc3339()),
                        update.id,
                    ])
                    .map_err(|e| PrePostingError::Database(e.to_string()))?;
            }
        }

        tx.commit()
            .map_err(|e| PrePostingError::Database(e.to_string()))?;
        Ok(changed)
    }
}

fn row_to_pre_posting(row: &rusqlite::Row) -> rusqlite::Result<PrePosting> {
    let status: String = row.get(12)?;
    let status = PrePostingStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            12,
            rusqlite::types::Type::Text,
            format!("unknown pre-posting status: {}", status).into(),
        )
    })?;

    Ok(PrePosting {
        id: row.get(0)?,
        order_id: row.get(1)?,
        carrier_id: row.get(2)?,
        tracking_code: row.get(3)?,
        label_number: row.get(4)?,
        service_code: row.get(5)?,
        service_name: row.get(6)?,
        weight_kg: db::decimal(row, 7)?,
        height_cm: row.get(8)?,
        width_cm: row.get(9)?,
        length_cm: row.get(10)?,
        declared_value: db::opt_decimal(row, 11)?,
        status,
        created_at: db::timestamp(row, 13)?,
        posted_at: db::opt_timestamp(row, 14)?,
        delivered_at: db::opt_timestamp(row, 15)?,
        posting_deadline: db::opt_timestamp(row, 16)?,
        notes: row.get(17)?,
        error_message: row.get(18)?,
        carrier_response: row.get(19)?,
    })
}
