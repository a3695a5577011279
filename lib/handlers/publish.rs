//! Push and publish command handlers.

use super::common::{Context, current_dir, require_session};
use crate::batch::{BatchOptions, expand_globs, publish_multiple};
use crate::config::current_server_env;
use crate::error::CliResult;
use crate::manifest::find_extension_root;
use crate::npm::Npm;
use crate::prompt::{Prompter, TerminalPrompter};
use crate::publish::{ExtensionPublisher, InstallationOffer, PublishOptions};
use crate::session::Session;
use colored::Colorize;
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Flags of `shoutem publish`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishFlags {
    pub nobuild: bool,
    pub nopush: bool,
    pub noconfirm: bool,
    pub nocheck: bool,
}

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Developer account reserved for official extensions.
const ADMIN_DEVELOPER: &str = "shoutem";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Push and publish the current extension, or every extension matching `paths`.
pub async fn publish_extensions(paths: &[String], flags: PublishFlags) -> CliResult<()> {
    let prompter = TerminalPrompter;
    let ctx = require_session().await?;

    if !confirm_admin_action(&ctx.session, &prompter)? {
        println!("  {} Publish aborted", "!".bright_yellow().bold());
        return Ok(());
    }
    let npm = Npm::new();
    let options = PublishOptions {
        nobuild: flags.nobuild,
        nocheck: flags.nocheck,
        negotiate_version: true,
        quiet: false,
    };
    let publisher = ExtensionPublisher::new(
        &ctx.session,
        &ctx.extensions,
        &npm,
        &prompter,
        &prompter,
        options,
    );

    if paths.is_empty() {
        let dir = find_extension_root(&current_dir()?)?;
        println!();
        publish_single(&ctx, &publisher, &dir, flags.nopush).await?;
        println!("\n  {}", "Success".bright_green().bold());
        return Ok(());
    }

    let candidates = expand_globs(paths);
    let batch = BatchOptions {
        nopush: flags.nopush,
        noconfirm: flags.noconfirm,
        target: Some(current_server_env().to_string()),
    };
    tracing::debug!("publishing {} candidate paths", candidates.len());

    publish_multiple(&candidates, &batch, &publisher, &prompter)
        .await?
        .into_result()
        .map(|_| ())
}

/// `shoutem push` was replaced by `shoutem publish`.
pub async fn push_deprecated() -> CliResult<()> {
    println!(
        "{}",
        "WARNING: shoutem push command is deprecated. Use shoutem publish instead"
            .bright_yellow()
            .bold()
    );
    std::process::exit(1);
}

/// Publishing as the admin developer always needs an explicit yes, even with
/// `--noconfirm`.
fn confirm_admin_action(session: &Session, prompter: &dyn Prompter) -> CliResult<bool> {
    if session.developer_name() != ADMIN_DEVELOPER {
        return Ok(true);
    }

    prompter.confirm(
        "WARNING: you are about to publish using shoutem developer. Are you sure about that?",
        false,
    )
}

/// Upload (unless `nopush`) and publish one extension, then offer it to the
/// enclosing app.
pub(super) async fn publish_single(
    ctx: &Context,
    publisher: &ExtensionPublisher<'_>,
    dir: &Path,
    nopush: bool,
) -> CliResult<()> {
    if !nopush {
        publisher.upload_extension(dir).await?;
    }

    let published = publisher.publish_extension(dir).await?;

    match publisher.offer_installation(dir, &ctx.apps, &published).await {
        Ok(Some(InstallationOffer::Installed)) => {
            println!("  {} Installed into the app", "✓".bright_green());
        }
        Ok(Some(InstallationOffer::Updated { from_version })) => {
            println!(
                "  {} App updated from {} to {}",
                "✓".bright_green(),
                from_version.dimmed(),
                published.version.bright_cyan()
            );
        }
        Ok(_) => {}
        Err(e) => {
            println!(
                "  {} Could not update the app installation: {}",
                "!".bright_yellow().bold(),
                e.to_string().dimmed()
            );
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
