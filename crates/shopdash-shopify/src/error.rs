use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShopifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by {shop_domain} (retry after {retry_after_secs}s)")]
    RateLimited {
        shop_domain: String,
        retry_after_secs: u64,
    },

    /// 401 or 403. For an installed app this almost always means the access
    /// token lacks the scope for the requested resource.
    #[error("access denied by {shop_domain} (HTTP {status}) for {url}")]
    AccessDenied {
        shop_domain: String,
        status: u16,
        url: String,
    },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("response from {url} has no \"{collection}\" array")]
    MissingCollection {
        collection: &'static str,
        url: String,
    },

    #[error("pagination limit reached for {resource}: exceeded {max_pages} pages")]
    PaginationLimit { resource: String, max_pages: usize },

    #[error("invalid shop domain \"{shop_domain}\": {reason}")]
    InvalidShopDomain { shop_domain: String, reason: String },
}

impl ShopifyError {
    /// `true` when the store refused the request outright rather than failing
    /// transiently.
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::NotFound { .. })
    }
}
