//! `shoutem` is the primary CLI binary.

use clap::Parser;
use colored::Colorize;
use shoutem_cli::handlers::{self, PublishFlags};
use shoutem_cli::{Cli, CliError, CliResult, Command, ExtensionCommand, PackError};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Only enable logging when RUST_LOG is set.
    init_tracing();

    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print an error with appropriate formatting based on error type.
fn print_error(e: &CliError) {
    println!();
    match e {
        CliError::Remote {
            operation,
            status,
            message,
        } => {
            println!(
                "  {} {} failed {}",
                "error[remote]".bright_red().bold(),
                operation,
                format!("(HTTP {})", status).dimmed()
            );
            if !message.is_empty() {
                println!();
                for line in message.split(", ") {
                    println!("    {}", line);
                }
            }
        }
        CliError::NotLoggedIn => {
            println!("  {} Not logged in", "error".bright_red().bold());
            println!();
            println!(
                "    {}: Run {} first",
                "hint".bright_blue().bold(),
                "shoutem login".bright_white()
            );
        }
        CliError::NotExtensionDir(path) => {
            println!("  {} extension.json not found", "error".bright_red().bold());
            println!();
            println!("    {}: {}", "Searched".dimmed(), path.display());
        }
        CliError::NotPlatformDir(path) => {
            println!("  {} Not a platform directory", "error".bright_red().bold());
            println!();
            println!("    {}: {}", "Searched".dimmed(), path.display());
            println!(
                "    {}: Run this command from inside an app created with shoutem",
                "hint".bright_blue().bold()
            );
        }
        CliError::Validation(message) => {
            println!("  {} Syntax check failed", "error".bright_red().bold());
            println!();
            for line in message.lines() {
                println!("    {}", line);
            }
        }
        CliError::Dependency { missing } => {
            println!(
                "  {} Missing extension dependencies",
                "error".bright_red().bold()
            );
            println!();
            for name in missing {
                println!("    {} {}", "→".bright_red(), name);
            }
        }
        CliError::Pack(PackError::MissingPackageJson { missing }) => {
            println!("  {} Incomplete extension", "error[pack]".bright_red().bold());
            println!();
            for dir in missing {
                println!(
                    "    {} {} has no package.json",
                    "→".bright_red(),
                    dir.display()
                );
            }
        }
        CliError::BatchIncomplete { failed, total } => {
            println!(
                "  {} {} of {} extensions failed",
                "error[batch]".bright_red().bold(),
                failed,
                total
            );
        }
        CliError::Cancelled => {
            println!("  {} Operation cancelled", "✗".bright_red());
        }
        // For all other errors, use a consistent styled format
        _ => {
            let msg = e.to_string();
            if let Some((prefix, rest)) = msg.split_once(": ")
                && prefix.ends_with("error")
            {
                println!(
                    "  {} {}",
                    format!("error[{}]", prefix.to_lowercase().replace(" error", ""))
                        .bright_red()
                        .bold(),
                    rest.dimmed()
                );
            } else {
                println!("  {} {}", "error".bright_red().bold(), msg);
            }
        }
    }
    println!();
}

/// Initialize tracing. Only enables logging when RUST_LOG is set.
fn init_tracing() {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    if !rust_log_set {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Publish {
            paths,
            nobuild,
            nopush,
            noconfirm,
            nocheck,
        } => {
            let flags = PublishFlags {
                nobuild,
                nopush,
                noconfirm,
                nocheck,
            };
            handlers::publish_extensions(&paths, flags).await
        }

        Command::Push { .. } => handlers::push_deprecated().await,

        Command::Pack { path, nobuild } => handlers::pack_extension(path, nobuild).await,

        Command::Extension(ExtensionCommand::Publish { name }) => {
            handlers::extension_publish(&name).await
        }

        Command::Configure {
            release,
            production,
        } => handlers::configure_platform(release, production).await,

        Command::Builder { app_id } => handlers::open_builder(app_id).await,

        Command::Login { token } => handlers::auth_login(token.as_deref()).await,

        Command::Logout => handlers::auth_logout().await,

        Command::Whoami => handlers::auth_status().await,

        Command::Env { name } => handlers::server_env(name.as_deref()).await,
    }
}
