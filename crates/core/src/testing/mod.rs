//! Testing utilities and in-memory implementations of the external seams.
//!
//! Lets the managers be exercised end to end without the carrier API or a
//! mail server.
//!
//! # Example
//!
//! ```rust,ignore
//! use postagem_core::testing::{fixtures, MockCarrier, RecordingNotifier};
//!
//! let carrier = MockCarrier::new();
//! carrier.set_tracking(fixtures::tracking_result("AA000000001BR", &[("BDE", "Objeto entregue ao destinatario")])).await;
//!
//! let orders = SqliteOrderBook::in_memory()?;
//! orders.insert_order(&fixtures::order(1001, "72910000"))?;
//! ```

mod mock_carrier;
mod mock_token_source;
mod recording_notifier;

pub use mock_carrier::{CarrierCall, MockCarrier};
pub use mock_token_source::MockTokenSource;
pub use recording_notifier::{RecordingNotifier, SentNotification};

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::carrier::{TrackingEvent, TrackingResult};
    use crate::config::{CarrierConfig, SenderConfig};
    use crate::orders::{DeliveryAddress, Order, ReturnItem, ReturnRequest, ReturnStatus};

    /// Smallest byte sequence that passes for a PDF.
    pub const SAMPLE_PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF\n";

    /// The store as configured sender.
    pub fn sender() -> SenderConfig {
        SenderConfig {
            name: "Loja Exemplo".to_string(),
            tax_id: "12.345.678/0001-90".to_string(),
            phone: "(61) 3333-4444".to_string(),
            email: "expedicao@loja.example".to_string(),
            postal_code: "70000-000".to_string(),
            street: "SIA Trecho 3".to_string(),
            number: "100".to_string(),
            complement: Some("Galpao 2".to_string()),
            neighborhood: "Zona Industrial".to_string(),
            city: "Brasilia".to_string(),
            state: "DF".to_string(),
        }
    }

    /// Carrier settings with credentials and the fixture sender.
    pub fn carrier_config() -> CarrierConfig {
        CarrierConfig {
            user: "loja".to_string(),
            access_code: "segredo".to_string(),
            postage_card: "0076543210".to_string(),
            contract: Some("9912345678".to_string()),
            sender: sender(),
            ..Default::default()
        }
    }

    /// A paid order with two items and a delivery address.
    pub fn order(id: i64, postal_code: &str) -> Order {
        Order {
            id,
            code: format!("PED-{}", id),
            customer_name: "Maria Silva".to_string(),
            customer_email: format!("cliente{}@example.com", id),
            customer_phone: Some("(61) 99876-5432".to_string()),
            customer_tax_id: Some("123.456.789-09".to_string()),
            total: Decimal::new(18990, 2),
            freight: Decimal::new(2990, 2),
            coupon_discount: Decimal::new(1000, 2),
            item_count: 2,
            tracking_code: None,
            delivery_address: Some(DeliveryAddress {
                postal_code: postal_code.to_string(),
                street: "Rua das Palmeiras".to_string(),
                number: "45".to_string(),
                complement: None,
                neighborhood: "Centro".to_string(),
                city: "Valparaiso de Goias".to_string(),
                state: "GO".to_string(),
            }),
        }
    }

    /// A freshly requested return with two lines.
    pub fn return_request(id: i64, order_id: i64) -> ReturnRequest {
        ReturnRequest {
            id,
            order_id,
            customer_name: "Maria Silva".to_string(),
            customer_email: format!("cliente{}@example.com", order_id),
            customer_phone: Some("(61) 99876-5432".to_string()),
            customer_tax_id: Some("123.456.789-09".to_string()),
            items: vec![
                ReturnItem {
                    product_name: "Retrovisor".to_string(),
                    variant: Some("Esquerdo".to_string()),
                    quantity: 1,
                    unit_price: Decimal::new(8990, 2),
                },
                ReturnItem {
                    product_name: "Manopla".to_string(),
                    variant: None,
                    quantity: 2,
                    unit_price: Decimal::new(2500, 2),
                },
            ],
            status: ReturnStatus::Requested,
            shipment: None,
        }
    }

    pub fn tracking_event(event_type: &str, description: &str) -> TrackingEvent {
        TrackingEvent {
            occurred_at: Some(Utc::now()),
            description: description.to_string(),
            event_type: event_type.to_string(),
            unit: Some("Agencia dos Correios".to_string()),
            city: Some("Brasilia".to_string()),
            state: Some("DF".to_string()),
        }
    }

    /// Tracking result with `(type, description)` events, newest first.
    pub fn tracking_result(tracking_code: &str, events: &[(&str, &str)]) -> TrackingResult {
        TrackingResult {
            tracking_code: tracking_code.to_string(),
            postal_type: Some("SEDEX".to_string()),
            events: events
                .iter()
                .map(|(event_type, description)| tracking_event(event_type, description))
                .collect(),
            error: false,
            message: None,
        }
    }
}
