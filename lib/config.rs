//! Server environment selection and service URLs.

use crate::constants::{
    APP_MANAGER_URL_ENV, EXTENSION_MANAGER_URL_ENV, SERVER_ENV_ENV, SERVER_ENV_PATH,
};
use crate::error::{CliError, CliResult};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Backend environment the CLI talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerEnv {
    #[default]
    Production,
    Qa,
    Dev,
    Local,
}

/// Base URLs of the remote services for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrls {
    /// Extension manager API.
    pub extension_manager: String,
    /// App manager API.
    pub app_manager: String,
    /// Builder dashboard.
    pub app_builder: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ServerEnv {
    /// All known environments.
    pub const ALL: [ServerEnv; 4] = [
        ServerEnv::Production,
        ServerEnv::Qa,
        ServerEnv::Dev,
        ServerEnv::Local,
    ];

    /// Environment name as stored on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerEnv::Production => "production",
            ServerEnv::Qa => "qa",
            ServerEnv::Dev => "dev",
            ServerEnv::Local => "local",
        }
    }

    /// Service URLs for this environment, honouring URL override env vars.
    pub fn services(&self) -> ServiceUrls {
        let (extension_manager, app_manager, app_builder) = match self {
            ServerEnv::Production => (
                "https://extensions.api.shoutem.com",
                "https://apps.api.shoutem.com",
                "https://builder.shoutem.com",
            ),
            ServerEnv::Qa => (
                "https://extensions.api.qa.shoutem.com",
                "https://apps.api.qa.shoutem.com",
                "https://builder.qa.shoutem.com",
            ),
            ServerEnv::Dev => (
                "https://extensions.api.dev.shoutem.com",
                "https://apps.api.dev.shoutem.com",
                "https://builder.dev.shoutem.com",
            ),
            ServerEnv::Local => (
                "http://localhost:3001",
                "http://localhost:3002",
                "http://localhost:3000",
            ),
        };

        ServiceUrls {
            extension_manager: std::env::var(EXTENSION_MANAGER_URL_ENV)
                .unwrap_or_else(|_| extension_manager.to_string()),
            app_manager: std::env::var(APP_MANAGER_URL_ENV)
                .unwrap_or_else(|_| app_manager.to_string()),
            app_builder: app_builder.to_string(),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolve the active server environment.
///
/// Priority: `SHOUTEM_ENV` env var > `<home>/server-env` file > production.
pub fn current_server_env() -> ServerEnv {
    if let Ok(name) = std::env::var(SERVER_ENV_ENV)
        && let Ok(env) = name.parse()
    {
        return env;
    }

    read_server_env(&SERVER_ENV_PATH).unwrap_or_default()
}

/// Read a stored server environment name, ignoring missing or unknown values.
pub fn read_server_env(path: &Path) -> Option<ServerEnv> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// Persist the selected server environment.
pub fn write_server_env(path: &Path, env: ServerEnv) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, env.as_str())?;
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ServerEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerEnv {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerEnv::ALL
            .into_iter()
            .find(|env| env.as_str() == s)
            .ok_or_else(|| {
                CliError::Generic(format!(
                    "Unknown server environment '{}' (expected one of: production, qa, dev, local)",
                    s
                ))
            })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_server_env_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("server-env");

        assert_eq!(read_server_env(&path), None);

        write_server_env(&path, ServerEnv::Dev).unwrap();
        assert_eq!(read_server_env(&path), Some(ServerEnv::Dev));
    }

    #[test]
    fn test_unknown_server_env_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server-env");
        std::fs::write(&path, "staging\n").unwrap();

        assert_eq!(read_server_env(&path), None);
        assert!("staging".parse::<ServerEnv>().is_err());
        assert_eq!("qa".parse::<ServerEnv>().unwrap(), ServerEnv::Qa);
    }
}
