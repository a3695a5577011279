//! Pre-flight checks run before an extension is packed.
//!
//! Two gates: the extension code must be free of syntax errors, and every
//! extension listed under `dependencies` must exist on the extension manager.

use crate::constants::{EXTENSION_PARTS, PACKAGE_JSON_FILE};
use crate::error::{CliError, CliResult};
use crate::manifest::{ExtensionManifest, PackageJson, has_package_json};
use crate::npm::PackageTool;
use crate::registry::{ExtensionRegistry, Lookup};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

const SYNTAX_ERROR_MESSAGE: &str =
    "Syntax errors detected, aborting push! Use `shoutem publish --nocheck` to override";

const LINT_SCRIPT: &str = "lint";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A file that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Validation gate for an extension directory.
pub struct Preflight<'a> {
    tool: &'a dyn PackageTool,
    registry: &'a dyn ExtensionRegistry,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> Preflight<'a> {
    pub fn new(tool: &'a dyn PackageTool, registry: &'a dyn ExtensionRegistry) -> Self {
        Self { tool, registry }
    }

    /// Run the syntax check, then the dependency check.
    pub async fn validate(&self, dir: &Path) -> CliResult<()> {
        self.check_syntax(dir).await?;
        self.check_dependencies(dir).await
    }

    /// Parse every JSON file of the extension and run `lint` scripts.
    pub async fn check_syntax(&self, dir: &Path) -> CliResult<()> {
        let mut issues = find_json_errors(dir);

        if issues.is_empty() {
            for part in EXTENSION_PARTS {
                let part_dir = dir.join(part);
                if !has_package_json(&part_dir) || !PackageJson::load(&part_dir)?.has_script(LINT_SCRIPT)
                {
                    continue;
                }

                if let Err(e) = self.tool.run_script(&part_dir, LINT_SCRIPT).await {
                    issues.push(SyntaxIssue {
                        path: part_dir.join(PACKAGE_JSON_FILE),
                        message: e.to_string(),
                    });
                }
            }
        }

        if issues.is_empty() {
            return Ok(());
        }

        let details: Vec<String> = issues
            .iter()
            .map(|issue| format!("  {}: {}", issue.path.display(), issue.message))
            .collect();
        Err(CliError::Validation(format!(
            "{}\n{}",
            SYNTAX_ERROR_MESSAGE,
            details.join("\n")
        )))
    }

    /// Every declared dependency must be known to the extension manager.
    pub async fn check_dependencies(&self, dir: &Path) -> CliResult<()> {
        let manifest = ExtensionManifest::load(dir)?;

        let mut missing = Vec::new();
        for dependency in manifest.dependencies() {
            if let Lookup::NotFound = self.registry.get_extension(dependency).await? {
                missing.push(dependency.clone());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(CliError::Dependency { missing })
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find JSON files under `dir` that do not parse, skipping `node_modules` and hidden dirs.
pub fn find_json_errors(dir: &Path) -> Vec<SyntaxIssue> {
    WalkDir::new(dir)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_ignored(entry))
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "json")
        })
        .filter_map(|entry| {
            let parsed = std::fs::read_to_string(entry.path())
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<serde_json::Value>(&content).map_err(|e| e.to_string())
                });
            parsed.err().map(|message| SyntaxIssue {
                path: entry.path().to_path_buf(),
                message,
            })
        })
        .collect()
}

fn is_ignored(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.file_type().is_dir() && (name == "node_modules" || name.starts_with('.'))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
