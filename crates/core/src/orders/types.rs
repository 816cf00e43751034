use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub postal_code: String,
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
}

/// An order as the shipping code sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    /// Human-readable order code shown to customers.
    pub code: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_tax_id: Option<String>,
    pub total: Decimal,
    pub freight: Decimal,
    pub coupon_discount: Decimal,
    /// Sum of cart item quantities.
    pub item_count: u32,
    pub tracking_code: Option<String>,
    pub delivery_address: Option<DeliveryAddress>,
}

impl Order {
    /// Value of the goods: total minus freight plus the coupon discount.
    pub fn goods_value(&self) -> Decimal {
        self.total - self.freight + self.coupon_discount
    }
}

/// Return lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStatus {
    Requested,
    LabelIssued,
    Shipped,
    UnderReview,
    RefundIssued,
    Rejected,
    Refunded,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Requested => "requested",
            ReturnStatus::LabelIssued => "label_issued",
            ReturnStatus::Shipped => "shipped",
            ReturnStatus::UnderReview => "under_review",
            ReturnStatus::RefundIssued => "refund_issued",
            ReturnStatus::Rejected => "rejected",
            ReturnStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "requested" => Some(ReturnStatus::Requested),
            "label_issued" => Some(ReturnStatus::LabelIssued),
            "shipped" => Some(ReturnStatus::Shipped),
            "under_review" => Some(ReturnStatus::UnderReview),
            "refund_issued" => Some(ReturnStatus::RefundIssued),
            "rejected" => Some(ReturnStatus::Rejected),
            "refunded" => Some(ReturnStatus::Refunded),
            _ => None,
        }
    }

    /// Text used in customer messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ReturnStatus::Requested => "Return requested",
            ReturnStatus::LabelIssued => "Return label issued",
            ReturnStatus::Shipped => "Return shipped",
            ReturnStatus::UnderReview => "Under review",
            ReturnStatus::RefundIssued => "Refund issued",
            ReturnStatus::Rejected => "Rejected",
            ReturnStatus::Refunded => "Refunded",
        }
    }
}

/// A returned line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnItem {
    pub product_name: String,
    pub variant: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Carrier data recorded on a return once its label exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnShipment {
    pub carrier_id: String,
    pub tracking_code: Option<String>,
    pub posting_deadline: Option<DateTime<Utc>>,
    pub carrier_response: String,
}

/// A customer return request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub id: i64,
    pub order_id: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_tax_id: Option<String>,
    pub items: Vec<ReturnItem>,
    pub status: ReturnStatus,
    pub shipment: Option<ReturnShipment>,
}

impl ReturnRequest {
    /// Sum of unit price times quantity.
    pub fn total_value(&self) -> Decimal {
        self.items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_status_mapping() {
        let all = [
            ReturnStatus::Requested,
            ReturnStatus::LabelIssued,
            ReturnStatus::Shipped,
            ReturnStatus::UnderReview,
            ReturnStatus::RefundIssued,
            ReturnStatus::Rejected,
            ReturnStatus::Refunded,
        ];
        for status in all {
            assert_eq!(ReturnStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ReturnStatus::LabelIssued.display_name(), "Return label issued");
        assert_eq!(ReturnStatus::parse("lost"), None);
    }

    #[test]
    fn test_return_totals() {
        let ret = ReturnRequest {
            id: 1,
            order_id: 1,
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_phone: None,
            customer_tax_id: None,
            items: vec![
                ReturnItem {
                    product_name: "Retrovisor".to_string(),
                    variant: Some("Esquerdo".to_string()),
                    quantity: 2,
                    unit_price: Decimal::new(4590, 2),
                },
                ReturnItem {
                    product_name: "Manete".to_string(),
                    variant: None,
                    quantity: 1,
                    unit_price: Decimal::new(3000, 2),
                },
            ],
            status: ReturnStatus::Requested,
            shipment: None,
        };
        assert_eq!(ret.total_value(), Decimal::new(12180, 2));
        assert_eq!(ret.total_quantity(), 3);
    }

    #[test]
    fn test_order_goods_value() {
        let order = Order {
            id: 1,
            code: "PED-1".to_string(),
            customer_name: "Ana".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_phone: None,
            customer_tax_id: None,
            total: Decimal::new(15000, 2),
            freight: Decimal::new(2500, 2),
            coupon_discount: Decimal::new(1000, 2),
            item_count: 2,
            tracking_code: None,
            delivery_address: None,
        };
        assert_eq!(order.goods_value(), Decimal::new(13500, 2));
    }
}
