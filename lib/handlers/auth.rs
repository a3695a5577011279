//! Developer authentication command handlers.

use crate::config::current_server_env;
use crate::constants::TOKEN_ENV;
use crate::error::{CliError, CliResult};
use crate::prompt::TerminalPrompter;
use crate::registry::{ExtensionManagerClient, ExtensionRegistry, Lookup};
use crate::session::{
    Credentials, credentials_path, delete_credentials, load_credentials, open_session,
    save_credentials,
};
use colored::Colorize;
use console::Term;
use std::io::{self, Write};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Login as a developer.
///
/// If `token` is provided, uses it directly. Otherwise prompts for hidden input.
pub async fn auth_login(token: Option<&str>) -> CliResult<()> {
    let env = current_server_env();
    let services = env.services();

    let token = if let Some(t) = token {
        t.to_string()
    } else {
        println!();
        println!(
            "  To authenticate with {}, create an API token in the builder:",
            env.to_string().bright_blue()
        );
        println!();
        println!(
            "  1. Open: {}",
            format!("{}/account/tokens", services.app_builder)
                .bright_cyan()
                .underline()
        );
        println!("  2. Create a token and copy it");
        println!();
        print!("  Paste your API token: ");
        io::stdout().flush()?;

        let term = Term::stderr();
        let token = term
            .read_secure_line()
            .map_err(|e| CliError::Generic(format!("Failed to read token: {}", e)))?;
        token.trim().to_string()
    };

    if token.is_empty() {
        println!("  {} No token provided", "✗".bright_red());
        return Ok(());
    }

    println!("\n  {} Validating token...", "→".bright_blue());

    let client = ExtensionManagerClient::new(&services)?.with_auth_token(&token);
    match open_session(&client, &TerminalPrompter).await {
        Ok(session) => {
            let developer = session.developer_name().to_string();
            let creds = Credentials {
                token,
                developer: developer.clone(),
                server_env: env.to_string(),
            };
            save_credentials(&credentials_path(), &creds).await?;

            println!(
                "  {} Logged in as {}",
                "✓".bright_green(),
                developer.bright_cyan()
            );
            println!(
                "    Token stored in {}",
                credentials_path().display().to_string().dimmed()
            );
        }
        Err(e) => {
            println!(
                "  {} Authentication failed: {}",
                "✗".bright_red(),
                e.to_string().dimmed()
            );
        }
    }

    Ok(())
}

/// Forget stored credentials.
pub async fn auth_logout() -> CliResult<()> {
    let path = credentials_path();
    if let Some(creds) = load_credentials(&path).await? {
        delete_credentials(&path).await?;
        println!(
            "  {} Logged out from {} (was {})",
            "✓".bright_green(),
            creds.server_env.bright_blue(),
            creds.developer.bright_cyan()
        );
    } else {
        println!("  {} Not logged in", "✗".bright_yellow());
    }

    Ok(())
}

/// Show the developer the current token belongs to.
pub async fn auth_status() -> CliResult<()> {
    let env = current_server_env();
    let services = env.services();

    let (token, source) = match std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()) {
        Some(token) => (token, "environment variable"),
        None => match load_credentials(&credentials_path()).await? {
            Some(creds) => (creds.token, "stored credentials"),
            None => {
                println!("  {} Not logged in", "✗".bright_yellow());
                println!(
                    "    Run {} or set {}",
                    "shoutem login".bright_cyan(),
                    TOKEN_ENV.bright_white()
                );
                return Ok(());
            }
        },
    };

    let client = ExtensionManagerClient::new(&services)?.with_auth_token(&token);
    match client.get_developer().await {
        Ok(Lookup::NotFound) => {
            println!("  {} Authenticated via {}", "✓".bright_green(), source);
            println!(
                "    No developer registered yet, run {} to create one",
                "shoutem login".bright_cyan()
            );
        }
        Ok(Lookup::Found(developer)) => {
            println!("  {} Authenticated via {}", "✓".bright_green(), source);
            println!(
                "    {}: {}",
                "Developer".dimmed(),
                developer.name.bright_cyan()
            );
            println!("    {}: {}", "Server".dimmed(), env.to_string().bright_blue());
            println!(
                "    {}: {}...{}",
                "Token".dimmed(),
                &token[..8.min(token.len())],
                &token[token.len().saturating_sub(4)..]
            );
        }
        Err(e) => {
            println!("  {} Token from {} is invalid", "✗".bright_red(), source);
            println!("    {}", e.to_string().dimmed());
        }
    }

    Ok(())
}
