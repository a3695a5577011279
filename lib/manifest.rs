//! Extension and sub-project manifests.
//!
//! `extension.json` describes the extension as a whole; each sub-project
//! (`app`, `server`) is an npm package with its own `package.json`. Unknown
//! fields are kept in `extra`, and rewrites keep the file's key order.

use crate::constants::{EXTENSION_MANIFEST_FILE, PACKAGE_JSON_FILE};
use crate::error::{CliError, CliResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Contents of `extension.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionManifest {
    /// Extension name (without the developer prefix).
    pub name: String,

    /// Extension version (semver).
    pub version: String,

    /// Human readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Platform version requirement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Canonical names of extensions this one depends on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,

    /// Remaining fields, preserved as-is.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Contents of a sub-project `package.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<serde_json::Map<String, serde_json::Value>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Remote identifier of an extension: `{developer}.{extension}`, optionally
/// pinned to a version as `{developer}.{extension}-{version}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalName {
    pub developer: String,
    pub extension: String,
    pub version: Option<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExtensionManifest {
    /// Load `extension.json` from an extension directory.
    pub fn load(dir: &Path) -> CliResult<Self> {
        let path = dir.join(EXTENSION_MANIFEST_FILE);
        if !path.exists() {
            return Err(CliError::NotExtensionDir(dir.to_path_buf()));
        }
        read_json(&path)
    }

    /// Write `extension.json` back to an extension directory.
    pub fn save(&self, dir: &Path) -> CliResult<()> {
        write_json(&dir.join(EXTENSION_MANIFEST_FILE), self)
    }

    /// Canonical names of the extensions this one depends on.
    pub fn dependencies(&self) -> &[String] {
        self.dependencies.as_deref().unwrap_or_default()
    }

    /// Canonical name of this extension for a developer, pinned to its version.
    pub fn canonical_name(&self, developer: &str) -> CanonicalName {
        CanonicalName::new(developer, &self.name).with_version(&self.version)
    }
}

impl PackageJson {
    /// Load `package.json` from a sub-project directory.
    pub fn load(dir: &Path) -> CliResult<Self> {
        read_json(&dir.join(PACKAGE_JSON_FILE))
    }

    /// Write `package.json` back to a sub-project directory.
    pub fn save(&self, dir: &Path) -> CliResult<()> {
        write_json(&dir.join(PACKAGE_JSON_FILE), self)
    }

    /// Whether the package declares an npm script.
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts
            .as_ref()
            .is_some_and(|scripts| scripts.contains_key(name))
    }
}

impl CanonicalName {
    /// Create an unversioned canonical name.
    pub fn new(developer: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            developer: developer.into(),
            extension: extension.into(),
            version: None,
        }
    }

    /// Pin the canonical name to a version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The `{developer}.{extension}` part, without version.
    pub fn module_name(&self) -> String {
        format!("{}.{}", self.developer, self.extension)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Whether a directory contains an `extension.json`.
pub fn has_extension_manifest(dir: &Path) -> bool {
    dir.join(EXTENSION_MANIFEST_FILE).is_file()
}

/// Whether a directory contains a `package.json`.
pub fn has_package_json(dir: &Path) -> bool {
    dir.join(PACKAGE_JSON_FILE).is_file()
}

/// Walk up from `start` to the directory holding `extension.json`.
pub fn find_extension_root(start: &Path) -> CliResult<std::path::PathBuf> {
    start
        .ancestors()
        .find(|dir| has_extension_manifest(dir))
        .map(Path::to_path_buf)
        .ok_or_else(|| CliError::NotExtensionDir(start.to_path_buf()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        CliError::Generic(format!("Failed to parse {}: {}", path.display(), e))
    })
}

/// Write `value` as pretty JSON, keeping the key order of the file it replaces.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let mut updated = serde_json::to_value(value)?;

    let previous = std::fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok());
    if let (Some(serde_json::Value::Object(previous)), serde_json::Value::Object(fields)) =
        (previous, &mut updated)
    {
        *fields = keep_key_order(&previous, std::mem::take(fields));
    }

    let mut content = serde_json::to_string_pretty(&updated)?;
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

/// Order `fields` like `previous`; keys `previous` lacks go last.
fn keep_key_order(
    previous: &serde_json::Map<String, serde_json::Value>,
    mut fields: serde_json::Map<String, serde_json::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    let mut ordered = serde_json::Map::new();
    for key in previous.keys() {
        if let Some(value) = fields.remove(key) {
            ordered.insert(key.clone(), value);
        }
    }
    ordered.extend(fields);
    ordered
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}.{}-{}", self.developer, self.extension, version),
            None => write!(f, "{}.{}", self.developer, self.extension),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
