//! SQLite-backed order book.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db;

use super::{
    DeliveryAddress, Order, OrderBook, OrderBookError, ReturnItem, ReturnRequest, ReturnShipment,
    ReturnStatus,
};

const ORDER_COLUMNS: &str = "id, code, customer_name, customer_email, customer_phone, customer_tax_id, total, freight, coupon_discount, item_count, tracking_code, postal_code, street, number, complement, neighborhood, city, state";

const RETURN_COLUMNS: &str = "id, order_id, customer_name, customer_email, customer_phone, customer_tax_id, items, status, carrier_id, tracking_code, posting_deadline, carrier_response";

/// SQLite-backed order book.
pub struct SqliteOrderBook {
    conn: Mutex<Connection>,
}

impl SqliteOrderBook {
    /// Open (or create) the order tables in the database at `path`.
    pub fn new(path: &Path) -> Result<Self, OrderBookError> {
        let conn = db::open(path).map_err(|e| OrderBookError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory order book (useful for testing).
    pub fn in_memory() -> Result<Self, OrderBookError> {
        let conn = db::open_in_memory().map_err(|e| OrderBookError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), OrderBookError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY,
                code TEXT NOT NULL,
                customer_name TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                customer_phone TEXT,
                customer_tax_id TEXT,
                total TEXT NOT NULL,
                freight TEXT NOT NULL,
                coupon_discount TEXT NOT NULL,
                item_count INTEGER NOT NULL DEFAULT 1,
                tracking_code TEXT,
                postal_code TEXT,
                street TEXT,
                number TEXT,
                complement TEXT,
                neighborhood TEXT,
                city TEXT,
                state TEXT
            );

            CREATE TABLE IF NOT EXISTS returns (
                id INTEGER PRIMARY KEY,
                order_id INTEGER NOT NULL,
                customer_name TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                customer_phone TEXT,
                customer_tax_id TEXT,
                items TEXT NOT NULL,
                status TEXT NOT NULL,
                carrier_id TEXT,
                tracking_code TEXT,
                posting_deadline TEXT,
                carrier_response TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_returns_order ON returns(order_id);
            "#,
        )
        .map_err(|e| OrderBookError::Database(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, OrderBookError> {
        self.conn
            .lock()
            .map_err(|_| OrderBookError::Database("connection lock poisoned".to_string()))
    }

    /// Insert or replace an order.
    pub fn insert_order(&self, order: &Order) -> Result<(), OrderBookError> {
        let conn = self.lock()?;
        let address = order.delivery_address.as_ref();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO orders ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                ORDER_COLUMNS
            ),
            params![
                order.id,
                order.code,
                order.customer_name,
                order.customer_email,
                order.customer_phone,
                order.customer_tax_id,
                order.total.to_string(),
                order.freight.to_string(),
                order.coupon_discount.to_string(),
                order.item_count,
                order.tracking_code,
                address.map(|a| a.postal_code.clone()),
                address.map(|a| a.street.clone()),
                address.map(|a| a.number.clone()),
                address.and_then(|a| a.complement.clone()),
                address.map(|a| a.neighborhood.clone()),
                address.map(|a| a.city.clone()),
                address.map(|a| a.state.clone()),
            ],
        )
        .map_err(|e| OrderBookError::Database(e.to_string()))?;
        Ok(())
    }

    /// Insert or replace a return request.
    pub fn insert_return(&self, ret: &ReturnRequest) -> Result<(), OrderBookError> {
        let conn = self.lock()?;
        let items =
            serde_json::to_string(&ret.items).map_err(|e| OrderBookError::Database(e.to_string()))?;
        let shipment = ret.shipment.as_ref();
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO returns ({}, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                RETURN_COLUMNS
            ),
            params![
                ret.id,
                ret.order_id,
                ret.customer_name,
                ret.customer_email,
                ret.customer_phone,
                ret.customer_tax_id,
                items,
                ret.status.as_str(),
                shipment.map(|s| s.carrier_id.clone()),
                shipment.and_then(|s| s.tracking_code.clone()),
                shipment.and_then(|s| s.posting_deadline).map(|d| d.to_rfc3339()),
                shipment.map(|s| s.carrier_response.clone()),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| OrderBookError::Database(e.to_string()))?;
        Ok(())
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let postal_code: Option<String> = row.get(11)?;
        let delivery_address = match postal_code {
            Some(postal_code) => Some(DeliveryAddress {
                postal_code,
                street: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
                number: row.get::<_, Option<String>>(13)?.unwrap_or_default(),
                complement: row.get(14)?,
                neighborhood: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
                city: row.get::<_, Option<String>>(16)?.unwrap_or_default(),
                state: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(Order {
            id: row.get(0)?,
            code: row.get(1)?,
            customer_name: row.get(2)?,
            customer_email: row.get(3)?,
            customer_phone: row.get(4)?,
            customer_tax_id: row.get(5)?,
            total: db::decimal(row, 6)?,
            freight: db::decimal(row, 7)?,
            coupon_discount: db::decimal(row, 8)?,
            item_count: row.get(9)?,
            tracking_code: row.get(10)?,
            delivery_address,
        })
    }

    fn row_to_return(row: &rusqlite::Row) -> rusqlite::Result<ReturnRequest> {
        let items_json: String = row.get(6)?;
        let items: Vec<ReturnItem> = serde_json::from_str(&items_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status_str: String = row.get(7)?;
        let status = ReturnStatus::parse(&status_str).unwrap_or(ReturnStatus::Requested);

        let carrier_id: Option<String> = row.get(8)?;
        let shipment = match carrier_id {
            Some(carrier_id) => Some(ReturnShipment {
                carrier_id,
                tracking_code: row.get(9)?,
                posting_deadline: db::opt_timestamp(row, 10)?,
                carrier_response: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
            }),
            None => None,
        };

        Ok(ReturnRequest {
            id: row.get(0)?,
            order_id: row.get(1)?,
            customer_name: row.get(2)?,
            customer_email: row.get(3)?,
            customer_phone: row.get(4)?,
            customer_tax_id: row.get(5)?,
            items,
            status,
            shipment,
        })
    }

    fn fetch_return(conn: &Connection, id: i64) -> Result<Option<ReturnRequest>, OrderBookError> {
        conn.query_row(
            &format!("SELECT {} FROM returns WHERE id = ?", RETURN_COLUMNS),
            params![id],
            Self::row_to_return,
        )
        .optional()
        .map_err(|e| OrderBookError::Database(e.to_string()))
    }
}

impl OrderBook for SqliteOrderBook {
    fn get_order(&self, id: i64) -> Result<Option<Order>, OrderBookError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS),
            params![id],
            Self::row_to_order,
        )
        .optional()
        .map_err(|e| OrderBookError::Database(e.to_string()))
    }

    fn set_tracking_code(&self, order_id: i64, tracking_code: &str) -> Result<(), OrderBookError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE orders SET tracking_code = ? WHERE id = ?",
                params![tracking_code, order_id],
            )
            .map_err(|e| OrderBookError::Database(e.to_string()))?;
        if updated == 0 {
            return Err(OrderBookError::NotFound(format!("order {}", order_id)));
        }
        Ok(())
    }

    fn get_return(&self, id: i64) -> Result<Option<ReturnRequest>, OrderBookError> {
        let conn = self.lock()?;
        Self::fetch_return(&conn, id)
    }

    fn record_return_shipment(
        &self,
        return_id: i64,
        shipment: &ReturnShipment,
    ) -> Result<ReturnRequest, OrderBookError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE returns SET carrier_id = ?, tracking_code = ?, posting_deadline = ?, carrier_response = ?, status = ?, updated_at = ? WHERE id = ?",
                params![
                    shipment.carrier_id,
                    shipment.tracking_code,
                    shipment.posting_deadline.map(|d| d.to_rfc3339()),
                    shipment.carrier_response,
                    ReturnStatus::LabelIssued.as_str(),
                    Utc::now().to_rfc3339(),
                    return_id,
                ],
            )
            .map_err(|e| OrderBookError::Database(e.to_string()))?;
        if updated == 0 {
            return Err(OrderBookError::NotFound(format!("return {}", return_id)));
        }
        Self::fetch_return(&conn, return_id)?
            .ok_or_else(|| OrderBookError::NotFound(format!("return {}", return_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[test]
    fn test_order_round_trip_with_address() {
        let book = SqliteOrderBook::in_memory().unwrap();
        let order = fixtures::order(1001, "72910000");
        book.insert_order(&order).unwrap();

        let loaded = book.get_order(1001).unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[test]
    fn test_order_without_address() {
        let book = SqliteOrderBook::in_memory().unwrap();
        let mut order = fixtures::order(7, "01001000");
        order.delivery_address = None;
        book.insert_order(&order).unwrap();

        assert!(book.get_order(7).unwrap().unwrap().delivery_address.is_none());
        assert!(book.get_order(8).unwrap().is_none());
    }

    #[test]
    fn test_set_tracking_code() {
        let book = SqliteOrderBook::in_memory().unwrap();
        book.insert_order(&fixtures::order(1, "72910000")).unwrap();

        book.set_tracking_code(1, "BR123456789BR").unwrap();
        assert_eq!(
            book.get_order(1).unwrap().unwrap().tracking_code.as_deref(),
            Some("BR123456789BR")
        );

        assert!(matches!(
            book.set_tracking_code(2, "BR000000000BR"),
            Err(OrderBookError::NotFound(_))
        ));
    }

    #[test]
    fn test_record_return_shipment_advances_status() {
        let book = SqliteOrderBook::in_memory().unwrap();
        book.insert_return(&fixtures::return_request(5, 1001)).unwrap();

        let shipment = ReturnShipment {
            carrier_id: "PP-9".to_string(),
            tracking_code: Some("BR987654321BR".to_string()),
            posting_deadline: None,
            carrier_response: "{}".to_string(),
        };
        let updated = book.record_return_shipment(5, &shipment).unwrap();

        assert_eq!(updated.status, ReturnStatus::LabelIssued);
        assert_eq!(updated.shipment, Some(shipment));
        assert_eq!(updated.items.len(), 2);
    }
}
