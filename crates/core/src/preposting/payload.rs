//! Building carrier pre-posting bodies from orders and returns.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::carrier::format::{digits_only, grams, money, split_phone};
use crate::carrier::{AdditionalService, DeclaredItem, Package, Party, PartyAddress, PrePostingPayload};
use crate::config::{CarrierConfig, SenderConfig};
use crate::orders::{DeliveryAddress, Order, ReturnRequest};

/// Box and letter formats; every shipment here is a box.
const OBJECT_FORMAT_BOX: &str = "2";

/// Package used for every return shipment.
pub fn return_package() -> Package {
    Package {
        weight_kg: Decimal::ONE,
        height_cm: 10,
        width_cm: 20,
        length_cm: 30,
    }
}

/// The store as a shipment party.
pub fn store_party(sender: &SenderConfig) -> Party {
    let (area_code, phone) = split_phone(&sender.phone);
    Party {
        name: sender.name.clone(),
        tax_id: digits_only(&sender.tax_id),
        area_code,
        phone,
        email: sender.email.clone(),
        address: PartyAddress {
            postal_code: digits_only(&sender.postal_code),
            street: sender.street.clone(),
            number: sender.number.clone(),
            complement: sender.complement.clone().filter(|c| !c.is_empty()),
            neighborhood: sender.neighborhood.clone(),
            city: sender.city.clone(),
            state: sender.state.clone(),
        },
    }
}

fn customer_party(
    name: &str,
    email: &str,
    phone: Option<&str>,
    tax_id: Option<&str>,
    address: &DeliveryAddress,
) -> Party {
    let (area_code, phone) = split_phone(phone.unwrap_or_default());
    Party {
        name: name.to_string(),
        tax_id: digits_only(tax_id.unwrap_or_default()),
        area_code,
        phone,
        email: email.to_string(),
        address: PartyAddress {
            postal_code: digits_only(&address.postal_code),
            street: address.street.clone(),
            number: address.number.clone(),
            complement: address.complement.clone().filter(|c| !c.is_empty()),
            neighborhood: address.neighborhood.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
        },
    }
}

/// Store to customer.
pub fn forward(
    order: &Order,
    address: &DeliveryAddress,
    service_code: &str,
    package: &Package,
    declared_value: Decimal,
    config: &CarrierConfig,
) -> PrePostingPayload {
    let recipient = customer_party(
        &order.customer_name,
        &order.customer_email,
        order.customer_phone.as_deref(),
        order.customer_tax_id.as_deref(),
        address,
    );
    let quantity = order.item_count.max(1);

    PrePostingPayload {
        correlation_id: Uuid::new_v4().to_string(),
        sender: store_party(&config.sender),
        recipient,
        service_code: service_code.to_string(),
        postage_card: config.postage_card.clone(),
        weight_grams: grams(package.weight_kg),
        object_format: OBJECT_FORMAT_BOX.to_string(),
        height_cm: package.height_cm.to_string(),
        width_cm: package.width_cm.to_string(),
        length_cm: package.length_cm.to_string(),
        acknowledges_restrictions: 1,
        reverse: None,
        declared_items: vec![DeclaredItem {
            content: config.declared_content.clone(),
            quantity: quantity.to_string(),
            value: money(declared_value),
        }],
        additional_services: vec![AdditionalService::declared_value(money(declared_value))],
        note: format!("Pedido #{}", order.code),
    }
}

/// Customer back to the store.
pub fn reverse(
    ret: &ReturnRequest,
    order: &Order,
    address: &DeliveryAddress,
    config: &CarrierConfig,
) -> PrePostingPayload {
    let package = return_package();
    let value = money(ret.total_value());
    let sender = customer_party(
        &ret.customer_name,
        &ret.customer_email,
        ret.customer_phone.as_deref(),
        ret.customer_tax_id.as_deref(),
        address,
    );

    PrePostingPayload {
        correlation_id: Uuid::new_v4().to_string(),
        sender,
        recipient: store_party(&config.sender),
        service_code: config.reverse_service_code.clone(),
        postage_card: config.postage_card.clone(),
        weight_grams: grams(package.weight_kg),
        object_format: OBJECT_FORMAT_BOX.to_string(),
        height_cm: package.height_cm.to_string(),
        width_cm: package.width_cm.to_string(),
        length_cm: package.length_cm.to_string(),
        acknowledges_restrictions: 1,
        reverse: Some(config.reverse_flag.clone()),
        declared_items: vec![DeclaredItem {
            content: config.return_content.clone(),
            quantity: ret.total_quantity().max(1).to_string(),
            value: value.clone(),
        }],
        additional_services: vec![AdditionalService::declared_value(value)],
        note: format!("Devolucao #{} - Pedido #{}", ret.id, order.code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn config() -> CarrierConfig {
        let mut config = CarrierConfig {
            user: "loja".to_string(),
            postage_card: "0076543210".to_string(),
            ..Default::default()
        };
        config.sender = fixtures::sender();
        config
    }

    #[test]
    fn test_forward_payload() {
        let order = fixtures::order(1001, "72910-000");
        let address = order.delivery_address.clone().unwrap();
        let package = Package {
            weight_kg: Decimal::new(1250, 3),
            height_cm: 8,
            width_cm: 16,
            length_cm: 24,
        };

        let payload = forward(
            &order,
            &address,
            "03298",
            &package,
            order.goods_value(),
            &config(),
        );

        assert_eq!(payload.service_code, "03298");
        assert_eq!(payload.postage_card, "0076543210");
        assert_eq!(payload.weight_grams, "1250");
        assert_eq!(payload.height_cm, "8");
        assert_eq!(payload.recipient.address.postal_code, "72910000");
        assert_eq!(payload.recipient.name, order.customer_name);
        assert_eq!(payload.sender.name, "Loja Exemplo");
        assert_eq!(payload.reverse, None);
        assert_eq!(payload.note, format!("Pedido #{}", order.code));
        assert_eq!(payload.declared_items[0].value, money(order.goods_value()));
        assert_eq!(payload.declared_items[0].quantity, order.item_count.to_string());
        assert_eq!(payload.additional_services[0].code, "019");
    }

    #[test]
    fn test_each_payload_gets_its_own_correlation_id() {
        let order = fixtures::order(1001, "72910000");
        let address = order.delivery_address.clone().unwrap();
        let ret = fixtures::return_request(7, order.id);

        let first = forward(&order, &address, "03220", &Package::default(), Decimal::ONE, &config());
        let second = forward(&order, &address, "03220", &Package::default(), Decimal::ONE, &config());
        let back = reverse(&ret, &order, &address, &config());

        assert!(Uuid::parse_str(&first.correlation_id).is_ok());
        assert_ne!(first.correlation_id, second.correlation_id);
        assert_ne!(first.correlation_id, back.correlation_id);
        assert_ne!(first.correlation_id, "loja");
    }

    #[test]
    fn test_forward_quantity_defaults_to_one() {
        let mut order = fixtures::order(1001, "72910000");
        order.item_count = 0;
        let address = order.delivery_address.clone().unwrap();
        let payload = forward(
            &order,
            &address,
            "03220",
            &Package::default(),
            Decimal::new(10, 0),
            &config(),
        );
        assert_eq!(payload.declared_items[0].quantity, "1");
        assert_eq!(payload.declared_items[0].value, "10.00");
        assert_eq!(payload.weight_grams, "300");
    }

    #[test]
    fn test_reverse_payload_swaps_parties() {
        let order = fixtures::order(1001, "72910000");
        let ret = fixtures::return_request(7, order.id);
        let address = order.delivery_address.clone().unwrap();

        let payload = reverse(&ret, &order, &address, &config());

        assert_eq!(payload.sender.name, ret.customer_name);
        assert_eq!(payload.recipient.name, "Loja Exemplo");
        assert_eq!(payload.service_code, "03220");
        assert_eq!(payload.reverse.as_deref(), Some("N"));
        assert_eq!(payload.weight_grams, "1000");
        assert_eq!(
            (payload.height_cm.as_str(), payload.width_cm.as_str(), payload.length_cm.as_str()),
            ("10", "20", "30")
        );
        assert_eq!(payload.declared_items[0].value, money(ret.total_value()));
        assert_eq!(
            payload.declared_items[0].quantity,
            ret.total_quantity().to_string()
        );
        assert_eq!(payload.note, format!("Devolucao #7 - Pedido #{}", order.code));
    }

    #[test]
    fn test_payload_serializes_with_carrier_names() {
        let order = fixtures::order(1001, "72910000");
        let address = order.delivery_address.clone().unwrap();
        let payload = forward(
            &order,
            &address,
            "03220",
            &Package::default(),
            Decimal::new(5000, 2),
            &config(),
        );
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["codigoServico"], "03220");
        assert_eq!(json["destinatario"]["endereco"]["cep"], "72910000");
        assert_eq!(json["listaServicoAdicional"][0]["valorDeclarado"], "50.00");
        assert!(json.get("logisticaReversa").is_none());
    }
}
