use shopdash_core::CoreError;
use shopdash_db::DbError;
use shopdash_shopify::ShopifyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    Normalize(#[from] CoreError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("Shopify API error: {0}")]
    Shopify(#[from] ShopifyError),

    #[error("no tenant is registered for shop domain {shop_domain}")]
    UnknownTenant { shop_domain: String },

    #[error("tenant for shop domain {shop_domain} is inactive")]
    InactiveTenant { shop_domain: String },

    #[error("tenant {shop_domain} has no Shopify access token")]
    MissingAccessToken { shop_domain: String },

    #[error("ingestion queue is shut down")]
    QueueClosed,
}
