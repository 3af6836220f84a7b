//! Webhook subscription management.

use clap::Subcommand;
use shopdash_core::AppConfig;
use shopdash_shopify::ShopCredentials;

/// Sub-commands available under `webhooks`.
#[derive(Debug, Subcommand)]
pub enum WebhookCommands {
    /// Subscribe the store to customer, product and order create/update topics
    Register {
        /// Shop domain of the tenant
        #[arg(long)]
        tenant: String,
        /// Public base URL of the shopdash server, e.g. https://shopdash.example.com
        #[arg(long)]
        base_url: String,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: WebhookCommands,
) -> anyhow::Result<()> {
    match command {
        WebhookCommands::Register { tenant, base_url } => {
            let tenant = crate::require_tenant(pool, &tenant).await?;
            let access_token = tenant.access_token.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "tenant '{}' has no access token; set one with `tenant add`",
                    tenant.shop_domain
                )
            })?;

            let client = crate::shopify_client(config)?;
            let shop = ShopCredentials {
                shop_domain: &tenant.shop_domain,
                access_token,
            };
            let registration = client.register_webhooks(shop, &base_url).await?;

            for topic in &registration.created {
                println!("registered {topic}");
            }
            for topic in &registration.already_registered {
                println!("already registered {topic}");
            }
        }
    }
    Ok(())
}
