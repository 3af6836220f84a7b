//! Normalization from loosely-typed Shopify payloads to canonical records.
//!
//! The same entity reaches us in different shapes: Admin REST pages and
//! webhook bodies use `snake_case`, internally produced payloads use
//! `camelCase`, and redacted or minimal bodies omit most optional fields.
//! Every field is read through a precedence list of names; the first
//! present, non-null, non-blank value wins.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::records::{
    CustomerRecord, InventoryLevelRecord, LineItemRecord, LocationRecord, OrderRecord,
    ProductRecord,
};
use crate::{CoreError, DEFAULT_ORDER_STATUS};

const PLACEHOLDER_EMAIL_DOMAIN: &str = "example.com";
const PLACEHOLDER_FIRST_NAME: &str = "Shopify";
const PLACEHOLDER_PRODUCT_TITLE: &str = "Untitled Product";
const PLACEHOLDER_LOCATION_NAME: &str = "Unnamed Location";

/// Normalizes a customer payload.
///
/// # Errors
///
/// Returns [`CoreError::MissingExternalId`] if the payload has no usable `id`.
pub fn normalize_customer(payload: &Value) -> Result<CustomerRecord, CoreError> {
    let external_id = require_id(payload, "customer")?;

    let email = text(payload, &["email", "contact_email", "contactEmail"])
        .unwrap_or_else(|| format!("missing_{external_id}@{PLACEHOLDER_EMAIL_DOMAIN}"));
    let first_name = text(payload, &["first_name", "firstName"])
        .unwrap_or_else(|| PLACEHOLDER_FIRST_NAME.to_string());
    let last_name = text(payload, &["last_name", "lastName"])
        .unwrap_or_else(|| format!("Customer {}", id_suffix(&external_id)));

    Ok(CustomerRecord {
        email,
        first_name,
        last_name,
        reported_total_spent: field(payload, &["total_spent", "totalSpent"]).and_then(money),
        currency: text(payload, &["currency"]),
        external_id,
    })
}

/// Normalizes a product payload.
///
/// Price comes from the first variant; inventory is the sum of every
/// variant's `inventory_quantity`, with missing quantities counted as zero.
///
/// # Errors
///
/// Returns [`CoreError::MissingExternalId`] if the payload has no usable `id`.
pub fn normalize_product(payload: &Value) -> Result<ProductRecord, CoreError> {
    let external_id = require_id(payload, "product")?;
    let variants = list(payload, &["variants"]);

    let price = variants
        .first()
        .and_then(|v| field(v, &["price"]))
        .and_then(money)
        .unwrap_or(Decimal::ZERO);

    let inventory = variants
        .iter()
        .filter_map(|v| field(v, &["inventory_quantity", "inventoryQuantity"]))
        .filter_map(integer)
        .fold(0_i64, i64::saturating_add);

    let images = field(payload, &["images"])
        .and_then(Value::as_array)
        .map(|imgs| {
            imgs.iter()
                .filter_map(|img| text(img, &["src", "url"]))
                .collect()
        });

    Ok(ProductRecord {
        title: text(payload, &["title"]).unwrap_or_else(|| PLACEHOLDER_PRODUCT_TITLE.to_string()),
        price,
        inventory,
        images,
        vendor: text(payload, &["vendor"]),
        product_type: text(payload, &["product_type", "productType"]),
        external_id,
    })
}

/// Normalizes an order payload, including its embedded customer and line items.
///
/// # Errors
///
/// Returns [`CoreError::MissingExternalId`] if the order, or an embedded
/// customer object, has no usable `id`.
pub fn normalize_order(payload: &Value) -> Result<OrderRecord, CoreError> {
    let external_id = require_id(payload, "order")?;

    let customer = match field(payload, &["customer"]) {
        Some(c) if c.is_object() => Some(normalize_customer(c)?),
        _ => None,
    };

    let items = list(payload, &["line_items", "lineItems"]);
    let line_items = if items.is_empty() {
        None
    } else {
        Some(items.iter().map(normalize_line_item).collect())
    };

    let financial_status = text(payload, &["financial_status", "financialStatus"]);
    let status = financial_status
        .clone()
        .unwrap_or_else(|| DEFAULT_ORDER_STATUS.to_string());

    Ok(OrderRecord {
        total_price: field(payload, &["total_price", "totalPrice"])
            .and_then(money)
            .unwrap_or(Decimal::ZERO),
        order_date: field(payload, &["created_at", "createdAt"]).and_then(timestamp),
        status,
        financial_status,
        fulfillment_status: text(payload, &["fulfillment_status", "fulfillmentStatus"]),
        tags: tags(payload),
        currency: text(payload, &["currency"]),
        customer,
        line_items,
        external_id,
    })
}

/// Normalizes a location from `locations.json`.
///
/// # Errors
///
/// Returns [`CoreError::MissingExternalId`] if the payload has no usable `id`.
pub fn normalize_location(payload: &Value) -> Result<LocationRecord, CoreError> {
    Ok(LocationRecord {
        external_id: require_id(payload, "location")?,
        name: text(payload, &["name"]).unwrap_or_else(|| PLACEHOLDER_LOCATION_NAME.to_string()),
    })
}

/// Normalizes an inventory level from `inventory_levels.json`.
///
/// # Errors
///
/// Returns [`CoreError::MissingExternalId`] if `inventory_item_id` is unusable.
pub fn normalize_inventory_level(payload: &Value) -> Result<InventoryLevelRecord, CoreError> {
    let external_inventory_item_id = field(payload, &["inventory_item_id", "inventoryItemId"])
        .and_then(external_id)
        .ok_or(CoreError::MissingExternalId {
            entity: "inventory level",
        })?;

    Ok(InventoryLevelRecord {
        external_inventory_item_id,
        available: field(payload, &["available"])
            .and_then(integer)
            .unwrap_or(0),
    })
}

fn normalize_line_item(item: &Value) -> LineItemRecord {
    LineItemRecord {
        external_product_id: field(item, &["product_id", "productId"]).and_then(external_id),
        title: field(item, &["title", "name"])
            .and_then(Value::as_str)
            .map(ToOwned::to_owned),
        quantity: field(item, &["quantity"])
            .and_then(integer)
            .and_then(|q| i32::try_from(q).ok())
            .unwrap_or(1),
        price: field(item, &["price"]).and_then(money).unwrap_or(Decimal::ZERO),
    }
}

// ---------------------------------------------------------------------------
// Field access helpers
// ---------------------------------------------------------------------------

/// Returns the first of `names` present on `payload` with a meaningful value.
///
/// `null` and blank strings are treated as absent so the chain moves on.
fn field<'a>(payload: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| match payload.get(*name)? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        v => Some(v),
    })
}

fn text(payload: &Value, names: &[&str]) -> Option<String> {
    field(payload, names)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

fn list<'a>(payload: &'a Value, names: &[&str]) -> &'a [Value] {
    field(payload, names)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

fn require_id(payload: &Value, entity: &'static str) -> Result<String, CoreError> {
    field(payload, &["id"])
        .and_then(external_id)
        .ok_or(CoreError::MissingExternalId { entity })
}

/// Shopify ids arrive as JSON numbers from REST and as strings elsewhere.
fn external_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn id_suffix(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(3)
        .map_or(0, |(idx, _)| idx);
    &id[start..]
}

/// Parses a monetary amount from a decimal string (`"12.50"`) or a JSON number.
fn money(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

#[allow(clippy::cast_possible_truncation)]
fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
        })
        .ok()
}

/// Order tags are a comma-separated string in REST payloads and an array in
/// some webhook bodies; both are stored as the comma-separated form.
fn tags(payload: &Value) -> Option<String> {
    match field(payload, &["tags"])? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", ");
            Some(joined).filter(|s| !s.is_empty())
        }
        _ => None,
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
