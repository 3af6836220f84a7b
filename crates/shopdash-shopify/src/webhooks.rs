//! Webhook subscription management for a store.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::{ShopCredentials, ShopifyClient};
use crate::error::ShopifyError;
use crate::rate_limit::retry_with_backoff;

/// Topics the ingestion pipeline subscribes every tenant to.
pub const WEBHOOK_TOPICS: [&str; 6] = [
    "customers/create",
    "customers/update",
    "products/create",
    "products/update",
    "orders/create",
    "orders/updated",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookSubscription {
    pub id: i64,
    pub topic: String,
    pub address: String,
}

#[derive(Deserialize)]
struct WebhookList {
    webhooks: Vec<WebhookSubscription>,
}

#[derive(Deserialize)]
struct WebhookEnvelope {
    webhook: WebhookSubscription,
}

/// Outcome of [`ShopifyClient::register_webhooks`], as topic names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookRegistration {
    pub created: Vec<String>,
    pub already_registered: Vec<String>,
}

impl ShopifyClient {
    /// Lists the store's webhook subscriptions.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`ShopifyClient::fetch_page`].
    pub async fn list_webhooks(
        &self,
        shop: ShopCredentials<'_>,
    ) -> Result<Vec<WebhookSubscription>, ShopifyError> {
        let url = self.admin_url(shop.shop_domain, "webhooks.json")?.to_string();

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self.send(self.client.get(&url), shop, &url).await?;
                let body = response.text().await?;
                let parsed = serde_json::from_str::<WebhookList>(&body).map_err(|e| {
                    ShopifyError::Deserialize {
                        context: format!("webhook list from {}", shop.shop_domain),
                        source: e,
                    }
                })?;
                Ok(parsed.webhooks)
            }
        })
        .await
    }

    /// Subscribes `address` to `topic` with JSON delivery.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`ShopifyClient::fetch_page`]. Shopify answers 422
    /// when the subscription already exists, surfaced as
    /// [`ShopifyError::UnexpectedStatus`].
    pub async fn create_webhook(
        &self,
        shop: ShopCredentials<'_>,
        topic: &str,
        address: &str,
    ) -> Result<WebhookSubscription, ShopifyError> {
        let url = self.admin_url(shop.shop_domain, "webhooks.json")?.to_string();
        let payload = json!({
            "webhook": { "topic": topic, "address": address, "format": "json" }
        });

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            let payload = payload.clone();
            async move {
                let request = self.client.post(&url).json(&payload);
                let response = self.send(request, shop, &url).await?;
                let body = response.text().await?;
                let parsed = serde_json::from_str::<WebhookEnvelope>(&body).map_err(|e| {
                    ShopifyError::Deserialize {
                        context: format!("created webhook {topic} on {}", shop.shop_domain),
                        source: e,
                    }
                })?;
                Ok(parsed.webhook)
            }
        })
        .await
    }

    /// Ensures every topic in [`WEBHOOK_TOPICS`] delivers to
    /// `{base_url}/api/v1/webhooks/shopify/{topic}`.
    ///
    /// Topics already subscribed at that exact address are left alone.
    ///
    /// # Errors
    ///
    /// Stops at the first listing or creation failure.
    pub async fn register_webhooks(
        &self,
        shop: ShopCredentials<'_>,
        base_url: &str,
    ) -> Result<WebhookRegistration, ShopifyError> {
        let existing = self.list_webhooks(shop).await?;
        let base_url = base_url.trim_end_matches('/');
        let mut outcome = WebhookRegistration::default();

        for topic in WEBHOOK_TOPICS {
            let address = webhook_address(base_url, topic);
            let present = existing
                .iter()
                .any(|hook| hook.topic == topic && hook.address == address);
            if present {
                outcome.already_registered.push(topic.to_owned());
                continue;
            }

            let created = self.create_webhook(shop, topic, &address).await?;
            tracing::info!(
                shop_domain = shop.shop_domain,
                topic,
                webhook_id = created.id,
                "registered webhook"
            );
            outcome.created.push(topic.to_owned());
        }

        Ok(outcome)
    }
}

#[must_use]
pub fn webhook_address(base_url: &str, topic: &str) -> String {
    format!(
        "{}/api/v1/webhooks/shopify/{topic}",
        base_url.trim_end_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_appends_topic_path() {
        assert_eq!(
            webhook_address("https://hooks.test/", "orders/create"),
            "https://hooks.test/api/v1/webhooks/shopify/orders/create"
        );
    }

    #[test]
    fn topics_cover_create_and_update_for_each_entity() {
        for entity in ["customers", "products", "orders"] {
            assert_eq!(
                WEBHOOK_TOPICS
                    .iter()
                    .filter(|t| t.starts_with(entity))
                    .count(),
                2
            );
        }
    }
}
