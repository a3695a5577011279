//! Platform and environment command handlers.

use super::common::current_dir;
use crate::config::{ServerEnv, current_server_env, write_server_env};
use crate::constants::{SERVER_ENV_ENV, SERVER_ENV_PATH};
use crate::error::{CliError, CliResult};
use crate::npm::Npm;
use crate::platform::{ConfigureOptions, PlatformConfig, builder_url, configure, platform_root};
use colored::Colorize;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Apply build flags and run the app's configure script.
pub async fn configure_platform(release: bool, production: bool) -> CliResult<()> {
    let root = platform_root(&current_dir()?)?;
    println!(
        "\n  {} Configuring {}",
        "→".bright_blue(),
        root.display().to_string().bold()
    );

    configure(&root, ConfigureOptions { release, production }, &Npm::new()).await?;

    println!("  {} App configured", "✓".bright_green());
    Ok(())
}

/// Print and open the builder URL of an app.
pub async fn open_builder(app_id: Option<String>) -> CliResult<()> {
    let app_id = match app_id {
        Some(id) => id,
        None => {
            let root = platform_root(&current_dir()?)?;
            PlatformConfig::load(&root)?.app_id.ok_or_else(|| {
                CliError::Generic(format!("No appId in {}", root.join("config.json").display()))
            })?
        }
    };

    let url = builder_url(&current_server_env().services().app_builder, &app_id);
    println!("{}", url);

    if let Err(e) = open::that_detached(&url) {
        tracing::debug!("failed to open browser: {}", e);
    }
    Ok(())
}

/// Show or select the server environment.
pub async fn server_env(name: Option<&str>) -> CliResult<()> {
    let Some(name) = name else {
        let env = current_server_env();
        println!("  {} Server environment: {}", "✓".bright_green(), env.to_string().bright_cyan());
        if std::env::var(SERVER_ENV_ENV).is_ok() {
            println!("    {}", format!("(set by {})", SERVER_ENV_ENV).dimmed());
        }
        return Ok(());
    };

    let env: ServerEnv = name.parse()?;
    write_server_env(&SERVER_ENV_PATH, env)?;
    println!(
        "  {} Server environment set to {}",
        "✓".bright_green(),
        env.to_string().bright_cyan()
    );
    Ok(())
}
