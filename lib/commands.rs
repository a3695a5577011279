//! CLI command definitions.

use crate::styles::styles;
use crate::{examples, examples_section};
use clap::{Parser, Subcommand};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const PUBLISH_EXAMPLES: &str = examples![
    "shoutem publish                        " # "Push and publish the extension in this directory",
    "shoutem publish ./extensions/*         " # "Publish every extension matching a glob",
    "shoutem publish a b --noconfirm        " # "Publish several extensions without asking",
    "shoutem publish --nopush               " # "Publish an already uploaded version",
    "shoutem publish --nobuild --nocheck    " # "Skip build and pre-flight checks",
];

const PACK_EXAMPLES: &str = examples![
    "shoutem pack                           " # "Pack the extension in this directory",
    "shoutem pack ./gallery                 " # "Pack a specific extension",
    "shoutem pack --nobuild                 " # "Pack without building app and server",
];

const LOGIN_EXAMPLES: &str = examples![
    "shoutem login                          " # "Paste an API token interactively",
    "shoutem login --token <TOKEN>          " # "Use a token directly",
    "SHOUTEM_TOKEN=<TOKEN> shoutem whoami   " # "Use a token from the environment",
];

const EXTENSION_PUBLISH_EXAMPLES: &str = examples![
    "shoutem extension publish gallery      " # "Publish extensions/<dev>.gallery of this app",
];

const CONFIGURE_EXAMPLES: &str = examples![
    "shoutem configure                      " # "Configure the app in this directory",
    "shoutem configure --release            " # "Use the last published configuration",
    "shoutem configure -p                   " # "Configure for a production build",
];

const BUILDER_EXAMPLES: &str = examples![
    "shoutem builder                        " # "Open the app of this directory",
    "shoutem builder 1234                   " # "Open a specific app",
];

const ENV_EXAMPLES: &str = examples![
    "shoutem env                            " # "Show the selected server environment",
    "shoutem env dev                        " # "Switch to the dev servers",
];

const CLI_EXAMPLES: &str = concat!(
    examples![
        "shoutem login                          " # "Authenticate as a developer",
        "shoutem publish                        " # "Push and publish the current extension",
        "shoutem pack                           " # "Pack the current extension",
        "shoutem builder                        " # "Open the app in the builder",
    ],
    "\n\n",
    examples_section!["Publishing a batch:";
        "shoutem publish ext-a ext-b            " # "1. Pick extensions to push",
        "shoutem publish 'extensions/*' --noconfirm" # "2. Or push every match",
        "shoutem publish 'extensions/*' --nopush" # "3. Publish what was pushed",
    ],
);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Shoutem CLI - Build and publish extensions.
#[derive(Debug, Parser)]
#[command(name = "shoutem", author, version, styles=styles())]
#[command(about = "Build and publish Shoutem extensions", after_help = CLI_EXAMPLES)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Push and publish extensions.
    #[command(after_help = PUBLISH_EXAMPLES)]
    Publish {
        /// Extension directories or glob patterns (defaults to current extension).
        paths: Vec<String>,

        /// Push and publish without building. Use this option carefully!
        #[arg(long)]
        nobuild: bool,

        /// Publish without pushing first. Use this option carefully!
        #[arg(long)]
        nopush: bool,

        /// Push extensions without asking for confirmation.
        #[arg(long)]
        noconfirm: bool,

        /// Push without checking for syntax errors and extension dependencies.
        #[arg(long)]
        nocheck: bool,
    },

    /// Upload local extension code (deprecated, use `publish`).
    #[command(hide = true)]
    Push {
        /// Ignored.
        paths: Vec<String>,
    },

    /// Pack an extension into extension.tgz.
    #[command(after_help = PACK_EXAMPLES)]
    Pack {
        /// Extension directory (defaults to current extension).
        path: Option<String>,

        /// Pack without building app and server.
        #[arg(long)]
        nobuild: bool,
    },

    /// Extension commands run from inside an app.
    #[command(subcommand)]
    Extension(ExtensionCommand),

    /// Run the app's configure script to sync with local extensions.
    #[command(after_help = CONFIGURE_EXAMPLES)]
    Configure {
        /// Reconfigure with the last published configuration.
        #[arg(short, long)]
        release: bool,

        /// Configure for a production build.
        #[arg(short, long)]
        production: bool,
    },

    /// Open an app in the builder dashboard.
    #[command(after_help = BUILDER_EXAMPLES)]
    Builder {
        /// App id (defaults to the app of the current directory).
        app_id: Option<String>,
    },

    /// Login as a Shoutem developer.
    #[command(after_help = LOGIN_EXAMPLES)]
    Login {
        /// API token (prompts if not provided).
        #[arg(long)]
        token: Option<String>,
    },

    /// Forget stored credentials.
    Logout,

    /// Show the developer you are logged in as.
    Whoami,

    /// Show or select the server environment.
    #[command(after_help = ENV_EXAMPLES)]
    Env {
        /// production, qa, dev or local.
        name: Option<String>,
    },
}

/// Extension subcommands.
#[derive(Debug, Subcommand)]
pub enum ExtensionCommand {
    /// Publish an extension of the app in the working directory.
    #[command(after_help = EXTENSION_PUBLISH_EXAMPLES)]
    Publish {
        /// Extension name, without the developer prefix.
        name: String,
    },
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_publish_flags() {
        let cli = Cli::try_parse_from(["shoutem", "publish", "a", "b/*", "--nopush", "--noconfirm"])
            .unwrap();
        match cli.command {
            Command::Publish {
                paths,
                nobuild,
                nopush,
                noconfirm,
                nocheck,
            } => {
                assert_eq!(paths, vec!["a", "b/*"]);
                assert!(nopush && noconfirm);
                assert!(!nobuild && !nocheck);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_extension_publish() {
        let cli = Cli::try_parse_from(["shoutem", "extension", "publish", "gallery"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Extension(ExtensionCommand::Publish { name }) if name == "gallery"
        ));
    }
}
