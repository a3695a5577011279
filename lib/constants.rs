//! Constants for shoutem-cli.
//!
//! This module contains all path and configuration constants.
//! Review these to ensure they match your environment.

use std::path::PathBuf;
use std::sync::LazyLock;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The descriptor file of an extension.
pub const EXTENSION_MANIFEST_FILE: &str = "extension.json";

/// The npm manifest file of a sub-project.
pub const PACKAGE_JSON_FILE: &str = "package.json";

/// The platform configuration file.
pub const PLATFORM_CONFIG_FILE: &str = "config.json";

/// Name of the archive produced by packing an extension.
pub const EXTENSION_ARCHIVE_FILE: &str = "extension.tgz";

/// Sub-projects every extension is made of, in pack order.
pub const EXTENSION_PARTS: &[&str] = &["app", "server"];

/// Package name that marks the root of a platform (mobile app) tree.
pub const PLATFORM_PACKAGE_NAME: &str = "@shoutem/mobile-app";

/// Remote tag of an extension version that was uploaded but never published.
pub const DEVELOP_TAG: &str = "develop";

/// Environment variable overriding the CLI home directory.
pub const CLI_HOME_ENV: &str = "SHOUTEM_CLI_HOME";

/// Environment variable overriding the selected server environment.
pub const SERVER_ENV_ENV: &str = "SHOUTEM_ENV";

/// Environment variable holding an API token.
pub const TOKEN_ENV: &str = "SHOUTEM_TOKEN";

/// Environment variable overriding the extension manager URL.
pub const EXTENSION_MANAGER_URL_ENV: &str = "SHOUTEM_EXTENSION_MANAGER_URL";

/// Environment variable overriding the app manager URL.
pub const APP_MANAGER_URL_ENV: &str = "SHOUTEM_APP_MANAGER_URL";

/// Default home directory for CLI state.
pub static DEFAULT_HOME_PATH: LazyLock<PathBuf> = LazyLock::new(|| {
    std::env::var(CLI_HOME_ENV)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".shoutem")))
        .unwrap_or_else(|| PathBuf::from(".shoutem"))
});

/// File storing the selected server environment name.
pub static SERVER_ENV_PATH: LazyLock<PathBuf> =
    LazyLock::new(|| DEFAULT_HOME_PATH.join("server-env"));

/// Directory holding stored credentials.
pub static AUTH_DIR: LazyLock<PathBuf> = LazyLock::new(|| DEFAULT_HOME_PATH.join("auth"));
