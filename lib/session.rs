//! Developer session.
//!
//! A `Session` carries the developer the API token belongs to. It is created
//! once per command and handed to every component that needs the developer
//! name.

use crate::constants::{AUTH_DIR, TOKEN_ENV};
use crate::error::{CliError, CliResult};
use crate::prompt::Prompter;
use crate::registry::{Developer, ExtensionRegistry, Lookup};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Stored credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// The API token.
    pub token: String,

    /// The developer name associated with the token.
    pub developer: String,

    /// The server environment this token is for.
    pub server_env: String,
}

/// Authenticated developer session.
#[derive(Debug, Clone)]
pub struct Session {
    developer: Developer,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Session {
    pub fn new(developer: Developer) -> Self {
        Self { developer }
    }

    /// Name of the developer owning the token.
    pub fn developer_name(&self) -> &str {
        &self.developer.name
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Get the path to the credentials file.
pub fn credentials_path() -> PathBuf {
    AUTH_DIR.join("credentials.json")
}

/// Load stored credentials.
pub async fn load_credentials(path: &Path) -> CliResult<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    let creds: Credentials = serde_json::from_str(&content)?;
    Ok(Some(creds))
}

/// Save credentials.
pub async fn save_credentials(path: &Path, creds: &Credentials) -> CliResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(creds)?;
    fs::write(path, content).await?;

    Ok(())
}

/// Delete stored credentials.
pub async fn delete_credentials(path: &Path) -> CliResult<()> {
    if path.exists() {
        fs::remove_file(path).await?;
    }

    if let Some(dir) = path.parent()
        && dir.exists()
    {
        let _ = fs::remove_dir(dir).await;
    }

    Ok(())
}

/// Get the current token (from env or stored credentials).
pub async fn resolve_token() -> CliResult<Option<String>> {
    if let Ok(token) = std::env::var(TOKEN_ENV)
        && !token.is_empty()
    {
        return Ok(Some(token));
    }

    Ok(load_credentials(&credentials_path())
        .await?
        .map(|creds| creds.token))
}

/// Build a session for the developer owning the registry's token.
///
/// An account without a developer is offered to register one.
pub async fn open_session(
    registry: &dyn ExtensionRegistry,
    prompter: &dyn Prompter,
) -> CliResult<Session> {
    let lookup = registry.get_developer().await.map_err(|e| match e {
        CliError::Remote { status: 401, .. } | CliError::Remote { status: 403, .. } => {
            CliError::NotLoggedIn
        }
        e => e,
    })?;

    let developer = match lookup {
        Lookup::Found(developer) => developer,
        Lookup::NotFound => register_developer(registry, prompter).await?,
    };

    tracing::debug!("session opened for developer {}", developer.name);
    Ok(Session::new(developer))
}

async fn register_developer(
    registry: &dyn ExtensionRegistry,
    prompter: &dyn Prompter,
) -> CliResult<Developer> {
    println!("  No developer is registered for this account yet.");
    let name = prompter.input("Pick a developer name:")?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CliError::Cancelled);
    }

    let developer = registry.create_developer(name).await?;
    tracing::debug!("registered developer {}", developer.name);
    Ok(developer)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRegistry, ScriptedPrompter};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_credentials_save_load_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth").join("credentials.json");

        assert!(load_credentials(&path).await.unwrap().is_none());

        let creds = Credentials {
            token: "tok".into(),
            developer: "acme".into(),
            server_env: "production".into(),
        };
        save_credentials(&path, &creds).await.unwrap();

        let loaded = load_credentials(&path).await.unwrap().unwrap();
        assert_eq!(loaded.token, "tok");
        assert_eq!(loaded.developer, "acme");

        delete_credentials(&path).await.unwrap();
        assert!(!path.exists());
        assert!(!dir.path().join("auth").exists());
    }

    #[tokio::test]
    async fn test_session_for_existing_developer() {
        let registry = FakeRegistry::new("acme");
        let prompter = ScriptedPrompter::answering("ignored");

        let session = open_session(&registry, &prompter).await.unwrap();

        assert_eq!(session.developer_name(), "acme");
        assert!(registry.created_developers().is_empty());
    }

    #[tokio::test]
    async fn test_unregistered_account_registers_developer() {
        let registry = FakeRegistry::unregistered();
        let prompter = ScriptedPrompter::answering(" acme ");

        let session = open_session(&registry, &prompter).await.unwrap();

        assert_eq!(session.developer_name(), "acme");
        assert_eq!(registry.created_developers(), vec!["acme".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_developer_name_cancels_registration() {
        let registry = FakeRegistry::unregistered();
        let prompter = ScriptedPrompter::answering("");

        assert!(matches!(
            open_session(&registry, &prompter).await,
            Err(CliError::Cancelled)
        ));
        assert!(registry.created_developers().is_empty());
    }
}
