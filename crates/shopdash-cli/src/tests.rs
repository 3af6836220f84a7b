use clap::Parser;

use super::*;

#[test]
fn parses_db_ping_command() {
    let cli = Cli::try_parse_from(["shopdash-cli", "db", "ping"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Ping
        })
    ));
}

#[test]
fn parses_db_migrate_command() {
    let cli =
        Cli::try_parse_from(["shopdash-cli", "db", "migrate"]).expect("expected valid cli args");

    assert!(matches!(
        cli.command,
        Some(Commands::Db {
            command: DbCommands::Migrate
        })
    ));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["shopdash-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn tenant_add_takes_optional_access_token() {
    let cli = Cli::try_parse_from([
        "shopdash-cli",
        "tenant",
        "add",
        "--name",
        "Acme",
        "--domain",
        "acme.myshopify.com",
        "--access-token",
        "shpat_123",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::Tenant {
            command: TenantCommands::Add { ref name, ref domain, access_token: Some(ref token) }
        }) if name == "Acme" && domain == "acme.myshopify.com" && token == "shpat_123"
    ));
}

#[test]
fn tenant_add_requires_domain() {
    assert!(Cli::try_parse_from(["shopdash-cli", "tenant", "add", "--name", "Acme"]).is_err());
}

#[test]
fn tenant_issue_token_parses_domain() {
    let cli = Cli::try_parse_from([
        "shopdash-cli",
        "tenant",
        "issue-token",
        "--domain",
        "acme.myshopify.com",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::Tenant {
            command: TenantCommands::IssueToken { ref domain }
        }) if domain == "acme.myshopify.com"
    ));
}

#[test]
fn sync_without_tenant_means_all() {
    let cli = Cli::try_parse_from(["shopdash-cli", "sync"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Sync { tenant: None })));
}

#[test]
fn recalc_totals_with_tenant() {
    let cli = Cli::try_parse_from([
        "shopdash-cli",
        "recalc-totals",
        "--tenant",
        "acme.myshopify.com",
    ])
    .unwrap();

    assert!(matches!(
        cli.command,
        Some(Commands::RecalcTotals { tenant: Some(ref t) }) if t == "acme.myshopify.com"
    ));
}

#[test]
fn webhooks_register_requires_base_url() {
    assert!(Cli::try_parse_from([
        "shopdash-cli",
        "webhooks",
        "register",
        "--tenant",
        "acme.myshopify.com",
    ])
    .is_err());

    let cli = Cli::try_parse_from([
        "shopdash-cli",
        "webhooks",
        "register",
        "--tenant",
        "acme.myshopify.com",
        "--base-url",
        "https://shopdash.example.com",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Webhooks {
            command: WebhookCommands::Register { ref base_url, .. }
        }) if base_url == "https://shopdash.example.com"
    ));
}
