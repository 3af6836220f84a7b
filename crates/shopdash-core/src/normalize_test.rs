use std::str::FromStr;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::json;

use super::*;

fn d(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

#[test]
fn customer_with_only_id_gets_placeholders() {
    let record = normalize_customer(&json!({ "id": "5" })).unwrap();

    assert_eq!(record.external_id, "5");
    assert_eq!(record.email, "missing_5@example.com");
    assert_eq!(record.first_name, "Shopify");
    assert_eq!(record.last_name, "Customer 5");
    assert!(record.reported_total_spent.is_none());
    assert!(record.currency.is_none());
}

#[test]
fn customer_last_name_uses_last_four_chars_of_id() {
    let record = normalize_customer(&json!({ "id": 7_091_234_567_u64 })).unwrap();
    assert_eq!(record.external_id, "7091234567");
    assert_eq!(record.last_name, "Customer 4567");
}

#[test]
fn customer_falls_back_to_contact_email() {
    let record = normalize_customer(&json!({
        "id": "11",
        "email": null,
        "contact_email": "ops@store.test",
    }))
    .unwrap();
    assert_eq!(record.email, "ops@store.test");
}

#[test]
fn customer_blank_strings_count_as_absent() {
    let record = normalize_customer(&json!({
        "id": "12",
        "email": "  ",
        "first_name": "",
    }))
    .unwrap();
    assert_eq!(record.email, "missing_12@example.com");
    assert_eq!(record.first_name, "Shopify");
}

#[test]
fn customer_camel_case_names_are_accepted() {
    let record = normalize_customer(&json!({
        "id": "13",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "totalSpent": "12.50",
    }))
    .unwrap();
    assert_eq!(record.first_name, "Ada");
    assert_eq!(record.last_name, "Lovelace");
    assert_eq!(record.reported_total_spent, Some(d("12.50")));
}

#[test]
fn customer_snake_case_wins_over_camel_case() {
    let record = normalize_customer(&json!({
        "id": "14",
        "first_name": "Snake",
        "firstName": "Camel",
    }))
    .unwrap();
    assert_eq!(record.first_name, "Snake");
}

#[test]
fn customer_without_id_is_rejected() {
    let err = normalize_customer(&json!({ "email": "x@y.test" })).unwrap_err();
    assert_eq!(err, CoreError::MissingExternalId { entity: "customer" });

    let err = normalize_customer(&json!({ "id": "   " })).unwrap_err();
    assert_eq!(err, CoreError::MissingExternalId { entity: "customer" });

    let err = normalize_customer(&json!({ "id": true })).unwrap_err();
    assert_eq!(err, CoreError::MissingExternalId { entity: "customer" });
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[test]
fn product_price_and_inventory_come_from_variants() {
    let record = normalize_product(&json!({
        "id": 632_910_392,
        "title": "IPod Nano - 8GB",
        "vendor": "Apple",
        "product_type": "Cult Products",
        "variants": [
            { "price": "199.00", "inventory_quantity": 10 },
            { "price": "209.00", "inventory_quantity": 20 },
            { "price": "219.00" },
        ],
        "images": [
            { "src": "https://cdn.shopify.test/a.jpg" },
            { "src": "https://cdn.shopify.test/b.jpg" },
        ],
    }))
    .unwrap();

    assert_eq!(record.external_id, "632910392");
    assert_eq!(record.price, d("199.00"));
    assert_eq!(record.inventory, 30);
    assert_eq!(
        record.images,
        Some(vec![
            "https://cdn.shopify.test/a.jpg".to_string(),
            "https://cdn.shopify.test/b.jpg".to_string(),
        ])
    );
    assert_eq!(record.vendor.as_deref(), Some("Apple"));
    assert_eq!(record.product_type.as_deref(), Some("Cult Products"));
}

#[test]
fn product_without_variants_or_images() {
    let record = normalize_product(&json!({ "id": "P1" })).unwrap();
    assert_eq!(record.title, "Untitled Product");
    assert_eq!(record.price, Decimal::ZERO);
    assert_eq!(record.inventory, 0);
    assert!(record.images.is_none());
}

#[test]
fn product_with_empty_image_list_keeps_empty_list() {
    let record = normalize_product(&json!({ "id": "P2", "images": [] })).unwrap();
    assert_eq!(record.images, Some(Vec::new()));
}

#[test]
fn product_unparseable_price_is_zero() {
    let record = normalize_product(&json!({
        "id": "P3",
        "variants": [{ "price": "free", "inventory_quantity": "4" }],
    }))
    .unwrap();
    assert_eq!(record.price, Decimal::ZERO);
    assert_eq!(record.inventory, 4);
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[test]
fn order_from_webhook_payload() {
    let record = normalize_order(&json!({
        "id": "1010101",
        "total_price": "99.00",
        "financial_status": "paid",
        "customer": {
            "id": "2020202",
            "first_name": "Unified",
            "last_name": "Tester",
            "email": "unified_tester@example.com",
        },
        "line_items": [
            { "product_id": "X", "title": "Widget", "quantity": 1, "price": "99.00" },
        ],
    }))
    .unwrap();

    assert_eq!(record.external_id, "1010101");
    assert_eq!(record.total_price, d("99.00"));
    assert_eq!(record.status, "paid");
    assert_eq!(record.financial_status.as_deref(), Some("paid"));
    assert!(record.order_date.is_none());

    let customer = record.customer.expect("embedded customer");
    assert_eq!(customer.external_id, "2020202");
    assert_eq!(customer.email, "unified_tester@example.com");

    let items = record.line_items.expect("line items");
    assert_eq!(
        items,
        vec![LineItemRecord {
            external_product_id: Some("X".to_string()),
            title: Some("Widget".to_string()),
            quantity: 1,
            price: d("99.00"),
        }]
    );
}

#[test]
fn order_defaults_to_pending_without_financial_status() {
    let record = normalize_order(&json!({ "id": 1 })).unwrap();
    assert_eq!(record.status, "pending");
    assert!(record.financial_status.is_none());
    assert_eq!(record.total_price, Decimal::ZERO);
    assert!(record.customer.is_none());
    assert!(record.line_items.is_none());
}

#[test]
fn order_empty_line_item_list_is_none() {
    let record = normalize_order(&json!({ "id": 2, "line_items": [] })).unwrap();
    assert!(record.line_items.is_none());
}

#[test]
fn order_null_customer_is_guest_order() {
    let record = normalize_order(&json!({ "id": 3, "customer": null })).unwrap();
    assert!(record.customer.is_none());
}

#[test]
fn order_with_customer_missing_id_is_rejected() {
    let err = normalize_order(&json!({ "id": 4, "customer": { "email": "a@b.test" } })).unwrap_err();
    assert_eq!(err, CoreError::MissingExternalId { entity: "customer" });
}

#[test]
fn order_parses_created_at_with_offset() {
    let record = normalize_order(&json!({
        "id": 5,
        "created_at": "2024-03-10T10:15:00-05:00",
    }))
    .unwrap();
    assert_eq!(
        record.order_date,
        Some(Utc.with_ymd_and_hms(2024, 3, 10, 15, 15, 0).unwrap())
    );
}

#[test]
fn order_parses_created_at_without_offset_as_utc() {
    let record = normalize_order(&json!({
        "id": 6,
        "createdAt": "2024-03-10T10:15:00.250",
    }))
    .unwrap();
    let expected = Utc.with_ymd_and_hms(2024, 3, 10, 10, 15, 0).unwrap()
        + chrono::Duration::milliseconds(250);
    assert_eq!(record.order_date, Some(expected));
}

#[test]
fn order_unparseable_created_at_is_none() {
    let record = normalize_order(&json!({ "id": 7, "created_at": "yesterday" })).unwrap();
    assert!(record.order_date.is_none());
}

#[test]
fn order_camel_case_payload() {
    let record = normalize_order(&json!({
        "id": "8",
        "totalPrice": 42.5,
        "financialStatus": "partially_paid",
        "fulfillmentStatus": "fulfilled",
        "lineItems": [{ "productId": 99, "name": "Gadget" }],
    }))
    .unwrap();
    assert_eq!(record.total_price, d("42.5"));
    assert_eq!(record.status, "partially_paid");
    assert_eq!(record.fulfillment_status.as_deref(), Some("fulfilled"));

    let items = record.line_items.unwrap();
    assert_eq!(items[0].external_product_id.as_deref(), Some("99"));
    assert_eq!(items[0].title.as_deref(), Some("Gadget"));
    assert_eq!(items[0].quantity, 1);
    assert_eq!(items[0].price, Decimal::ZERO);
}

#[test]
fn order_tags_accept_string_or_array() {
    let record = normalize_order(&json!({ "id": 9, "tags": "vip, wholesale" })).unwrap();
    assert_eq!(record.tags.as_deref(), Some("vip, wholesale"));

    let record = normalize_order(&json!({ "id": 10, "tags": ["vip", " ", "wholesale"] })).unwrap();
    assert_eq!(record.tags.as_deref(), Some("vip, wholesale"));

    let record = normalize_order(&json!({ "id": 11, "tags": [] })).unwrap();
    assert!(record.tags.is_none());
}

#[test]
fn line_item_without_product_id_keeps_none() {
    let record = normalize_order(&json!({
        "id": 12,
        "line_items": [{ "title": "Gift wrap", "quantity": 2, "price": "5.00" }],
    }))
    .unwrap();
    let items = record.line_items.unwrap();
    assert!(items[0].external_product_id.is_none());
    assert_eq!(items[0].quantity, 2);
}

#[test]
fn line_item_title_is_kept_verbatim_and_blank_is_absent() {
    let record = normalize_order(&json!({
        "id": 13,
        "line_items": [
            { "product_id": "X", "title": "  Widget (Large)  " },
            { "product_id": "Y", "title": "   " },
        ],
    }))
    .unwrap();
    let items = record.line_items.unwrap();
    assert_eq!(items[0].title.as_deref(), Some("  Widget (Large)  "));
    assert!(items[1].title.is_none());
}

// ---------------------------------------------------------------------------
// Locations and inventory
// ---------------------------------------------------------------------------

#[test]
fn location_name_fallback() {
    let record = normalize_location(&json!({ "id": 655_441_491 })).unwrap();
    assert_eq!(record.external_id, "655441491");
    assert_eq!(record.name, "Unnamed Location");
}

#[test]
fn inventory_level_null_available_is_zero() {
    let record = normalize_inventory_level(&json!({
        "inventory_item_id": 808_950_810,
        "location_id": 655_441_491,
        "available": null,
    }))
    .unwrap();
    assert_eq!(record.external_inventory_item_id, "808950810");
    assert_eq!(record.available, 0);
}

#[test]
fn inventory_level_without_item_id_is_rejected() {
    let err = normalize_inventory_level(&json!({ "available": 3 })).unwrap_err();
    assert_eq!(
        err,
        CoreError::MissingExternalId {
            entity: "inventory level"
        }
    );
}

#[test]
fn id_suffix_handles_short_and_multibyte_ids() {
    assert_eq!(id_suffix("5"), "5");
    assert_eq!(id_suffix("12345"), "2345");
    assert_eq!(id_suffix("ab€de"), "b€de");
}
