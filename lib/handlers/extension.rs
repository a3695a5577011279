//! `shoutem extension` command handlers.

use super::common::{current_dir, require_session};
use super::publish::publish_single;
use crate::error::{CliError, CliResult};
use crate::npm::Npm;
use crate::platform::{extensions_dir, platform_root};
use crate::prompt::TerminalPrompter;
use crate::publish::{ExtensionPublisher, PublishOptions};
use colored::Colorize;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Publish `extensions/<developer>.<name>` of the app in the working directory.
pub async fn extension_publish(name: &str) -> CliResult<()> {
    let root = platform_root(&current_dir()?)?;
    let ctx = require_session().await?;

    let dir = extensions_dir(&root).join(format!("{}.{}", ctx.session.developer_name(), name));
    if !dir.is_dir() {
        return Err(CliError::Generic(format!(
            "Path {} does not exist",
            dir.strip_prefix(&root).unwrap_or(&dir).display()
        )));
    }

    let npm = Npm::new();
    let prompter = TerminalPrompter;
    let options = PublishOptions {
        negotiate_version: true,
        ..Default::default()
    };
    let publisher = ExtensionPublisher::new(
        &ctx.session,
        &ctx.extensions,
        &npm,
        &prompter,
        &prompter,
        options,
    );

    println!();
    publish_single(&ctx, &publisher, &dir, false).await?;
    println!("\n  {}", "Success".bright_green().bold());

    Ok(())
}
