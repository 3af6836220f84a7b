pub mod client;
pub mod error;
pub mod pagination;
pub(crate) mod rate_limit;
pub mod webhooks;

pub use client::{Page, Resource, ShopCredentials, ShopifyClient, MAX_PAGES};
pub use error::ShopifyError;
pub use webhooks::{webhook_address, WebhookRegistration, WebhookSubscription, WEBHOOK_TOPICS};
