mod api_token;
mod app_config;
mod config;
pub mod normalize;
pub mod records;

use thiserror::Error;

pub use api_token::{generate_api_token, hash_api_token};
pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use normalize::{
    normalize_customer, normalize_inventory_level, normalize_location, normalize_order,
    normalize_product,
};
pub use records::{
    CustomerRecord, InventoryLevelRecord, LineItemRecord, LocationRecord, OrderRecord,
    ProductRecord,
};

/// Settlement statuses whose orders count towards a customer's `total_spent`.
///
/// Widening this list (e.g. to `partially_refunded`) changes the meaning of the
/// stored aggregate for every tenant.
pub const SETTLED_STATUSES: [&str; 2] = ["paid", "partially_paid"];

/// Settlement status assigned to orders whose payload carries none.
pub const DEFAULT_ORDER_STATUS: &str = "pending";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// The payload has no usable `id` (absent, null, blank, or not a string/number).
    #[error("{entity} payload has no usable external id")]
    MissingExternalId { entity: &'static str },
}

/// Returns `true` if an order in `status` counts towards customer spend.
#[must_use]
pub fn is_settled_status(status: &str) -> bool {
    SETTLED_STATUSES.contains(&status)
}
