mod sync;
mod tenant;
mod webhooks;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::tenant::TenantCommands;
use crate::webhooks::WebhookCommands;

#[derive(Debug, Parser)]
#[command(name = "shopdash-cli")]
#[command(about = "Shopdash ingestion and tenant administration")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage tenants (connected Shopify stores)
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Pull every customer, product, order, location and inventory level from Shopify
    Sync {
        /// Shop domain of a single tenant; all active tenants when omitted
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Recompute every customer's total spent from stored orders
    RecalcTotals {
        /// Shop domain of a single tenant; all active tenants when omitted
        #[arg(long)]
        tenant: Option<String>,
    },
    /// Manage Shopify webhook subscriptions
    Webhooks {
        #[command(subcommand)]
        command: WebhookCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("shopdash-cli: no command given; see --help");
        return Ok(());
    };

    let config = shopdash_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = shopdash_db::PoolConfig::from_app_config(&config);
    let pool = shopdash_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => run_db(&pool, command).await,
        Commands::Tenant { command } => tenant::run(&pool, &config, command).await,
        Commands::Sync { tenant } => sync::run_sync(pool, &config, tenant.as_deref()).await,
        Commands::RecalcTotals { tenant } => sync::run_recalc_totals(pool, tenant.as_deref()).await,
        Commands::Webhooks { command } => webhooks::run(&pool, &config, command).await,
    }
}

async fn run_db(pool: &sqlx::PgPool, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Ping => {
            shopdash_db::ping(pool).await?;
            println!("database: ok");
        }
        DbCommands::Migrate => {
            let applied = shopdash_db::run_migrations(pool).await?;
            println!("applied {applied} migration(s)");
        }
    }
    Ok(())
}

/// Loads one tenant by shop domain.
///
/// # Errors
///
/// Returns an error if no tenant owns `shop_domain` or the query fails.
pub(crate) async fn require_tenant(
    pool: &sqlx::PgPool,
    shop_domain: &str,
) -> anyhow::Result<shopdash_db::TenantRow> {
    shopdash_db::get_tenant_by_domain(pool, shop_domain)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!("tenant '{shop_domain}' not found; add it with `tenant add`")
        })
}

/// Builds the Shopify client from configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be constructed.
pub(crate) fn shopify_client(
    config: &shopdash_core::AppConfig,
) -> anyhow::Result<shopdash_shopify::ShopifyClient> {
    Ok(shopdash_shopify::ShopifyClient::new(
        config.shopify_request_timeout_secs,
        &config.shopify_user_agent,
        &config.shopify_api_version,
        config.shopify_max_retries,
        config.shopify_retry_backoff_base_secs,
    )?)
}

#[cfg(test)]
mod tests;
