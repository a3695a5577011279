//! Local platform (mobile app) trees.
//!
//! A platform root is the directory whose `package.json` is named
//! `@shoutem/mobile-app`. Its `config.json` ties the tree to an app on the
//! app manager.

use crate::constants::{PACKAGE_JSON_FILE, PLATFORM_CONFIG_FILE, PLATFORM_PACKAGE_NAME};
use crate::error::{CliError, CliResult};
use crate::manifest::{PackageJson, write_json};
use crate::npm::Npm;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Contents of a platform's `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "optional_id"
    )]
    pub app_id: Option<String>,

    #[serde(default)]
    pub release: bool,

    #[serde(default)]
    pub production: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Build flags applied by `configure`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigureOptions {
    pub release: bool,
    pub production: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PlatformConfig {
    pub fn load(root: &Path) -> CliResult<Self> {
        let path = root.join(PLATFORM_CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CliError::Generic(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, root: &Path) -> CliResult<()> {
        write_json(&root.join(PLATFORM_CONFIG_FILE), self)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Whether `dir` is the root of a platform tree.
pub fn is_platform_dir(dir: &Path) -> bool {
    dir.join(PACKAGE_JSON_FILE).is_file()
        && PackageJson::load(dir)
            .map(|package| package.name.as_deref() == Some(PLATFORM_PACKAGE_NAME))
            .unwrap_or(false)
}

/// Walk up from `start` to the platform root.
pub fn find_platform_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_platform_dir(dir))
        .map(Path::to_path_buf)
}

/// Like `find_platform_root`, failing with `NotPlatformDir`.
pub fn platform_root(start: &Path) -> CliResult<PathBuf> {
    find_platform_root(start).ok_or_else(|| CliError::NotPlatformDir(start.to_path_buf()))
}

/// Directory holding the platform's local extensions.
pub fn extensions_dir(root: &Path) -> PathBuf {
    root.join("extensions")
}

/// App id of the platform `dir` belongs to, if it is inside one.
pub fn find_app_id(dir: &Path) -> CliResult<Option<String>> {
    let Some(root) = find_platform_root(dir) else {
        return Ok(None);
    };
    if !root.join(PLATFORM_CONFIG_FILE).is_file() {
        return Ok(None);
    }
    Ok(PlatformConfig::load(&root)?.app_id)
}

/// Apply build flags to `config.json` and run the platform's configure script.
pub async fn configure(root: &Path, options: ConfigureOptions, npm: &Npm) -> CliResult<()> {
    let mut config = PlatformConfig::load(root)?;
    config.release = options.release;
    config.production = options.production;
    config.save(root)?;
    tracing::debug!(
        "configuring {} (release: {}, production: {})",
        root.display(),
        options.release,
        options.production
    );

    npm.install(&root.join("scripts")).await?;
    npm.run(root, "configure", &[]).await
}

/// Builder dashboard URL of an app.
pub fn builder_url(app_builder: &str, app_id: &str) -> String {
    format!("{}/app/{}", app_builder.trim_end_matches('/'), app_id)
}

fn optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
