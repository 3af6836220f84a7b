//! Authenticated client for the Shopify Admin REST API.

mod fetch_all;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;

use crate::error::ShopifyError;
use crate::pagination::extract_next_cursor;
use crate::rate_limit::retry_with_backoff;

/// Hard cap on pages per resource so a cycling cursor cannot loop forever.
///
/// Each page may itself be retried `max_retries` times, so the worst case is
/// `MAX_PAGES * (1 + max_retries)` requests.
pub const MAX_PAGES: usize = 500;

/// Shopify answers 429 with `Retry-After: 2.0` under normal bucket pressure.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Store address plus the offline access token issued at install time.
#[derive(Clone, Copy)]
pub struct ShopCredentials<'a> {
    pub shop_domain: &'a str,
    pub access_token: &'a str,
}

impl std::fmt::Debug for ShopCredentials<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopCredentials")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[redacted]")
            .finish()
    }
}

/// A paginated Admin API collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Path below `/admin/api/{version}/`, e.g. `customers.json`.
    pub path: &'static str,
    /// Top-level key holding the record array in the response body.
    pub collection: &'static str,
    /// Filters sent on the first page only. Shopify rejects filters
    /// alongside `page_info`; the cursor already encodes them.
    pub filters: Vec<(&'static str, String)>,
}

impl Resource {
    #[must_use]
    pub fn customers() -> Self {
        Self {
            path: "customers.json",
            collection: "customers",
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn products() -> Self {
        Self {
            path: "products.json",
            collection: "products",
            filters: Vec::new(),
        }
    }

    /// Orders default to `status=open` upstream; sync wants all of them.
    #[must_use]
    pub fn orders() -> Self {
        Self {
            path: "orders.json",
            collection: "orders",
            filters: vec![("status", "any".to_owned())],
        }
    }

    #[must_use]
    pub fn locations() -> Self {
        Self {
            path: "locations.json",
            collection: "locations",
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn inventory_levels(location_id: &str) -> Self {
        Self {
            path: "inventory_levels.json",
            collection: "inventory_levels",
            filters: vec![("location_ids", location_id.to_owned())],
        }
    }
}

/// One page of raw records and the cursor of the page after it.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<Value>,
    pub next_cursor: Option<String>,
}

/// Admin REST client with typed errors and retry on transient failures.
///
/// 429, network failures and 5xx are retried with exponential backoff up to
/// `max_retries` additional attempts. 401/403 surface as
/// [`ShopifyError::AccessDenied`] so callers can treat a missing scope as a
/// skip.
pub struct ShopifyClient {
    pub(crate) client: Client,
    pub(crate) api_version: String,
    pub(crate) max_retries: u32,
    pub(crate) backoff_base_secs: u64,
    /// Replaces `https://{shop_domain}` when set; used against local mocks.
    pub(crate) base_url: Option<String>,
}

impl ShopifyClient {
    /// Creates a client with the given timeout, `User-Agent`, Admin API
    /// version and retry policy. `max_retries = 0` disables retries.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        timeout_secs: u64,
        user_agent: &str,
        api_version: &str,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, ShopifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            api_version: api_version.to_owned(),
            max_retries,
            backoff_base_secs,
            base_url: None,
        })
    }

    /// Sends every request to `base_url` instead of the shop's own host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_owned());
        self
    }

    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Fetches one page of `resource`, retrying transient errors.
    ///
    /// # Errors
    ///
    /// - [`ShopifyError::InvalidShopDomain`] if the domain is not a bare host.
    /// - [`ShopifyError::AccessDenied`] on 401/403 (not retried).
    /// - [`ShopifyError::RateLimited`] on 429 after all retries.
    /// - [`ShopifyError::NotFound`] on 404 (not retried).
    /// - [`ShopifyError::UnexpectedStatus`] for any other non-2xx status.
    /// - [`ShopifyError::Deserialize`] / [`ShopifyError::MissingCollection`]
    ///   when the body is not the expected JSON shape.
    pub async fn fetch_page(
        &self,
        shop: ShopCredentials<'_>,
        resource: &Resource,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<Page, ShopifyError> {
        let mut url = self.admin_url(shop.shop_domain, resource.path)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            match page_info {
                Some(cursor) => {
                    query.append_pair("page_info", cursor);
                }
                None => {
                    for (key, value) in &resource.filters {
                        query.append_pair(key, value);
                    }
                }
            }
        }
        let url = url.to_string();

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let request = self.client.get(&url);
                let response = self.send(request, shop, &url).await?;

                // Read the Link header before the body consumes the response.
                let link_header = response
                    .headers()
                    .get(reqwest::header::LINK)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);

                let body = response.text().await?;
                let mut parsed =
                    serde_json::from_str::<Value>(&body).map_err(|e| ShopifyError::Deserialize {
                        context: format!("{} page from {}", resource.collection, shop.shop_domain),
                        source: e,
                    })?;

                let records = match parsed.get_mut(resource.collection).map(Value::take) {
                    Some(Value::Array(records)) => records,
                    _ => {
                        return Err(ShopifyError::MissingCollection {
                            collection: resource.collection,
                            url,
                        })
                    }
                };

                tracing::debug!(
                    shop_domain = shop.shop_domain,
                    resource = resource.collection,
                    count = records.len(),
                    "fetched page"
                );

                Ok(Page {
                    records,
                    next_cursor: extract_next_cursor(link_header.as_deref()),
                })
            }
        })
        .await
    }

    /// Attaches the access token, sends, and maps non-2xx statuses to
    /// [`ShopifyError`] variants.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        shop: ShopCredentials<'_>,
        url: &str,
    ) -> Result<Response, ShopifyError> {
        let response = request
            .header("X-Shopify-Access-Token", shop.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            return Err(ShopifyError::RateLimited {
                shop_domain: shop.shop_domain.to_owned(),
                retry_after_secs,
            });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ShopifyError::AccessDenied {
                shop_domain: shop.shop_domain.to_owned(),
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ShopifyError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(ShopifyError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        Ok(response)
    }

    /// Builds `https://{shop_domain}/admin/api/{version}/{path}`.
    ///
    /// # Errors
    ///
    /// Returns [`ShopifyError::InvalidShopDomain`] when the domain carries a
    /// scheme, a path or whitespace, or the result does not parse.
    pub(crate) fn admin_url(&self, shop_domain: &str, path: &str) -> Result<Url, ShopifyError> {
        validate_shop_domain(shop_domain)?;
        let origin = match &self.base_url {
            Some(base) => base.clone(),
            None => format!("https://{shop_domain}"),
        };
        let raw = format!("{origin}/admin/api/{}/{path}", self.api_version);
        Url::parse(&raw).map_err(|e| ShopifyError::InvalidShopDomain {
            shop_domain: shop_domain.to_owned(),
            reason: format!("\"{raw}\" is not a valid URL: {e}"),
        })
    }
}

fn validate_shop_domain(shop_domain: &str) -> Result<(), ShopifyError> {
    let invalid = |reason: &str| ShopifyError::InvalidShopDomain {
        shop_domain: shop_domain.to_owned(),
        reason: reason.to_owned(),
    };

    if shop_domain.trim().is_empty() {
        return Err(invalid("domain is empty"));
    }
    if shop_domain.contains("://") {
        return Err(invalid("expected a bare host without a scheme"));
    }
    if shop_domain.contains(['/', '?', '#']) || shop_domain.chars().any(char::is_whitespace) {
        return Err(invalid("expected a bare host"));
    }
    Ok(())
}

/// `Retry-After` arrives as seconds, sometimes fractional (`"2.0"`).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_retry_after(raw: &str) -> Option<u64> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(secs.ceil() as u64)
}

#[cfg(test)]
#[path = "../client_test.rs"]
mod tests;
