//! Account commands - login, token refresh, user and market info

use anyhow::{Context, Result};
use audi_client::AudiClient;

use crate::output::{MarketRow, OutputContext};

/// Log in and persist the tokens
pub async fn login(client: &AudiClient, user: &str, password: &str, ctx: &OutputContext) -> Result<()> {
    ctx.info(&format!("Logging in as {}...", user));

    client
        .login(user, password, true)
        .await
        .context("Login failed")?;

    ctx.success(&format!(
        "Logged in, tokens saved to {}",
        client.config().token_file.display()
    ));
    Ok(())
}

/// Refresh the persisted tokens
pub async fn refresh(client: &AudiClient, ctx: &OutputContext) -> Result<()> {
    client
        .refresh_tokens(true)
        .await
        .context("Token refresh failed")?;

    ctx.success("Tokens refreshed");
    Ok(())
}

/// Show the logged-in user
pub async fn whoami(client: &AudiClient, ctx: &OutputContext) -> Result<()> {
    let user = client
        .get_user_info()
        .await
        .context("Failed to get user info")?;

    let mut pairs = vec![
        ("Email", user.email.unwrap_or_default()),
        ("Name", user.name.unwrap_or_default()),
        ("Subject", user.sub.unwrap_or_default()),
    ];
    if let Some(verified) = user.email_verified {
        pairs.push(("Verified", verified.to_string()));
    }

    ctx.print_kv(&pairs);
    Ok(())
}

/// List available markets
pub async fn markets(client: &AudiClient, ctx: &OutputContext) -> Result<()> {
    let markets = client
        .get_markets()
        .await
        .context("Failed to get markets")?;

    let rows: Vec<MarketRow> = markets
        .into_iter()
        .map(|(country, spec)| MarketRow {
            country,
            default_language: spec.default_language.unwrap_or_default(),
            languages: spec.languages.keys().cloned().collect::<Vec<_>>().join(", "),
        })
        .collect();

    ctx.print(&rows);
    Ok(())
}
