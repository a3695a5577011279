//! Extension pack command handler.

use super::common::current_dir;
use crate::error::CliResult;
use crate::manifest::find_extension_root;
use crate::npm::Npm;
use crate::pack::{PackOptions, PackProgress, Packager};
use crate::styles::format_size;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Pack an extension into `extension.tgz` inside its directory.
pub async fn pack_extension(path: Option<String>, nobuild: bool) -> CliResult<()> {
    let dir = match path {
        Some(path) => PathBuf::from(path),
        None => find_extension_root(&current_dir()?)?,
    };

    let options = PackOptions {
        skip_build: nobuild,
        pack_to_temp_dir: false,
        on_progress: Some(Arc::new(|event| match event {
            PackProgress::BuildStarted { part } => {
                println!("  {} Building {}", "→".bright_blue(), part.bold());
            }
            PackProgress::BuildSkipped => {
                println!("  {} Build skipped", "·".dimmed());
            }
            PackProgress::PackStarted => {
                println!("  {} Packing", "→".bright_blue());
            }
            _ => {}
        })),
    };

    println!();
    let npm = Npm::new();
    let artifact = Packager::new(&npm).pack(&dir, &options).await?;

    println!(
        "  {} Packed {}",
        "✓".bright_green(),
        artifact.package_path.display().to_string().bright_cyan()
    );
    println!("    {}: {}", "Size".dimmed(), format_size(artifact.size()?));
    println!("    {}: {}", "SHA-256".dimmed(), artifact.checksum()?.dimmed());

    Ok(())
}
