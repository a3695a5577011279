//! Command handlers.

mod auth;
mod common;
mod extension;
mod pack_cmd;
mod platform;
mod publish;

//--------------------------------------------------------------------------------------------------
// Re-Exports
//--------------------------------------------------------------------------------------------------

pub use auth::{auth_login, auth_logout, auth_status};
pub use common::{Context, require_session};
pub use extension::extension_publish;
pub use pack_cmd::pack_extension;
pub use platform::{configure_platform, open_builder, server_env};
pub use publish::{PublishFlags, publish_extensions, push_deprecated};
