//! Tenant administration.

use clap::Subcommand;
use shopdash_core::AppConfig;
use shopdash_db::NewTenant;

/// Sub-commands available under `tenant`.
#[derive(Debug, Subcommand)]
pub enum TenantCommands {
    /// Register a store, or update the name and token of an existing one
    Add {
        #[arg(long)]
        name: String,
        /// Shop domain, e.g. acme.myshopify.com
        #[arg(long)]
        domain: String,
        /// Admin API access token
        #[arg(long, env = "SHOPIFY_ACCESS_TOKEN")]
        access_token: Option<String>,
    },
    /// List all tenants
    List,
    /// Stop ingesting and syncing a tenant
    Deactivate {
        #[arg(long)]
        domain: String,
    },
    /// Issue a new dashboard API token, replacing the previous one
    IssueToken {
        #[arg(long)]
        domain: String,
    },
}

pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: TenantCommands,
) -> anyhow::Result<()> {
    match command {
        TenantCommands::Add {
            name,
            domain,
            access_token,
        } => {
            let tenant = shopdash_db::create_tenant(
                pool,
                &NewTenant {
                    name: &name,
                    shop_domain: &domain,
                    access_token: access_token.as_deref(),
                },
            )
            .await?;
            println!(
                "tenant {} ({}) saved with id {}",
                tenant.name, tenant.shop_domain, tenant.id
            );
        }
        TenantCommands::List => {
            let tenants = shopdash_db::list_tenants(pool).await?;
            if tenants.is_empty() {
                println!("no tenants; add one with `tenant add`");
                return Ok(());
            }
            println!("{:<6}{:<40}{:<8}{:<10}NAME", "ID", "DOMAIN", "ACTIVE", "ACCESS");
            for t in &tenants {
                println!(
                    "{:<6}{:<40}{:<8}{:<10}{}",
                    t.id,
                    t.shop_domain,
                    if t.is_active { "yes" } else { "no" },
                    if t.access_token.is_some() { "set" } else { "missing" },
                    t.name
                );
            }
        }
        TenantCommands::Deactivate { domain } => {
            shopdash_db::deactivate_tenant(pool, &domain).await?;
            println!("tenant {domain} deactivated");
        }
        TenantCommands::IssueToken { domain } => {
            let token = shopdash_core::generate_api_token();
            let hash = shopdash_core::hash_api_token(&token, config.api_token_salt.as_deref());
            shopdash_db::set_tenant_api_token_hash(pool, &domain, &hash).await?;
            println!("API token for {domain} (shown once, store it now):");
            println!("{token}");
        }
    }
    Ok(())
}
