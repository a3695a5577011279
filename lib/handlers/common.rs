//! Shared handler setup.

use crate::config::current_server_env;
use crate::error::{CliError, CliResult};
use crate::prompt::TerminalPrompter;
use crate::registry::{AppManagerClient, ExtensionManagerClient};
use crate::session::{Session, open_session, resolve_token};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Authenticated clients for one command.
pub struct Context {
    pub extensions: ExtensionManagerClient,
    pub apps: AppManagerClient,
    pub session: Session,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resolve the token, open a session and build clients for the selected environment.
pub async fn require_session() -> CliResult<Context> {
    let token = resolve_token().await?.ok_or(CliError::NotLoggedIn)?;
    let services = current_server_env().services();

    let extensions = ExtensionManagerClient::new(&services)?.with_auth_token(&token);
    let apps = AppManagerClient::new(&services)?.with_auth_token(&token);
    let session = open_session(&extensions, &TerminalPrompter).await?;

    Ok(Context {
        extensions,
        apps,
        session,
    })
}

/// Current working directory.
pub fn current_dir() -> CliResult<std::path::PathBuf> {
    Ok(std::env::current_dir()?)
}
