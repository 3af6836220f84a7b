//! Canonical records produced by [`crate::normalize`].
//!
//! Every inbound payload, whether it came from a webhook body or a bulk
//! sync page, is mapped onto one of these before any merge logic runs.
//! Fields here are never "maybe renamed": the precedence rules for
//! alternative field names live in the normalizer only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A Shopify customer, with identity fields already resolved through the
/// fallback chains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Shopify customer id, kept as an opaque string.
    pub external_id: String,
    /// Never empty; synthesized as `missing_<id>@example.com` when absent.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// `total_spent` as reported by Shopify. Only a starting value: the
    /// stored aggregate is recomputed from local orders.
    pub reported_total_spent: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub external_id: String,
    pub title: String,
    /// Price of the first variant, or zero.
    pub price: Decimal,
    /// Sum of `inventory_quantity` across variants.
    pub inventory: i64,
    /// `images[].src`, or `None` when the payload has no image list at all.
    pub images: Option<Vec<String>>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub external_id: String,
    pub total_price: Decimal,
    /// `created_at`; `None` keeps whatever date is already stored.
    pub order_date: Option<DateTime<Utc>>,
    /// Settlement status: `financial_status`, defaulting to `"pending"`.
    pub status: String,
    pub financial_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub tags: Option<String>,
    pub currency: Option<String>,
    /// The embedded customer, if the order is not a guest order.
    pub customer: Option<CustomerRecord>,
    /// `Some` only when the payload carried a non-empty line item list.
    /// `None` leaves the stored items untouched.
    pub line_items: Option<Vec<LineItemRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub external_product_id: Option<String>,
    pub title: Option<String>,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    pub external_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryLevelRecord {
    pub external_inventory_item_id: String,
    /// `null` availability (untracked inventory) is stored as zero.
    pub available: i64,
}
