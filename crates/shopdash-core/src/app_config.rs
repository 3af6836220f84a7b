use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Salt mixed into tenant API token hashes. `None` hashes the bare token.
    pub api_token_salt: Option<String>,
    /// Shared secret Shopify signs webhook bodies with. Required in production.
    pub shopify_api_secret: Option<String>,
    pub shopify_api_version: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub shopify_request_timeout_secs: u64,
    pub shopify_user_agent: String,
    /// Records per page for bulk sync fetches; Shopify caps this at 250.
    pub shopify_page_size: u32,
    pub shopify_max_retries: u32,
    pub shopify_retry_backoff_base_secs: u64,
    pub dedupe_window_secs: u64,
    /// Six-field cron expression (seconds first) for the periodic sync job.
    pub sync_cron: String,
}

impl AppConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.env == Environment::Development
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "api_token_salt",
                &self.api_token_salt.as_ref().map(|_| "[redacted]"),
            )
            .field(
                "shopify_api_secret",
                &self.shopify_api_secret.as_ref().map(|_| "[redacted]"),
            )
            .field("shopify_api_version", &self.shopify_api_version)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "shopify_request_timeout_secs",
                &self.shopify_request_timeout_secs,
            )
            .field("shopify_user_agent", &self.shopify_user_agent)
            .field("shopify_page_size", &self.shopify_page_size)
            .field("shopify_max_retries", &self.shopify_max_retries)
            .field(
                "shopify_retry_backoff_base_secs",
                &self.shopify_retry_backoff_base_secs,
            )
            .field("dedupe_window_secs", &self.dedupe_window_secs)
            .field("sync_cron", &self.sync_cron)
            .finish()
    }
}
