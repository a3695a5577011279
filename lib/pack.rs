//! Extension packing.
//!
//! An extension is packed by packing each sub-project (`app`, `server`) with
//! the package tool, collecting the tarballs next to a copy of
//! `extension.json` and gzipping the result into a single `extension.tgz`.

use crate::constants::{
    EXTENSION_ARCHIVE_FILE, EXTENSION_MANIFEST_FILE, EXTENSION_PARTS, PACKAGE_JSON_FILE,
};
use crate::error::CliResult;
use crate::manifest::{
    CanonicalName, ExtensionManifest, PackageJson, has_extension_manifest, has_package_json,
};
use crate::npm::PackageTool;
use crate::prompt::Prompter;
use flate2::Compression;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Builder;
use tempfile::TempDir;
use thiserror::Error;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Progress event emitted during packing.
#[derive(Debug, Clone)]
pub enum PackProgress {
    /// Building a sub-project.
    BuildStarted { part: String },
    /// A sub-project was built.
    BuildFinished { part: String },
    /// The build step was skipped.
    BuildSkipped,
    /// Packing sub-projects and compressing the archive.
    PackStarted,
    /// Archive written.
    PackFinished,
}

/// Callback type for progress events.
pub type ProgressCallback = Arc<dyn Fn(PackProgress) + Send + Sync>;

/// Error types for pack operations.
#[derive(Debug, Error)]
pub enum PackError {
    /// The directory has no `extension.json`.
    #[error("{} cannot be packed because it has no extension.json file", .0.display())]
    ManifestNotFound(PathBuf),

    /// Building a sub-project failed.
    #[error("Failed to build {}: {reason}", .dir.display())]
    BuildFailed { dir: PathBuf, reason: String },

    /// Packing a sub-project failed.
    #[error("Failed to pack {}: {reason}", .dir.display())]
    PackFailed { dir: PathBuf, reason: String },

    /// Writing the archive failed.
    #[error("TAR error while trying to gzip '{}' to '{}': {source}", .from.display(), .to.display())]
    Compress {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Some sub-projects had no `package.json` and were left out of the archive.
    #[error(
        "Missing package.json in: {}. Every extension part must be an npm package.",
        .missing.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
    )]
    MissingPackageJson { missing: Vec<PathBuf> },

    /// Creating the temporary directory failed.
    #[error("Error creating temporary directory: {0}")]
    TempDir(std::io::Error),

    /// IO error during packing.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options for packing.
#[derive(Clone, Default)]
pub struct PackOptions {
    /// Skip building sub-projects.
    pub skip_build: bool,

    /// Write the archive into the temporary workspace instead of the extension directory.
    pub pack_to_temp_dir: bool,

    /// Progress callback for reporting packing progress.
    pub on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for PackOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackOptions")
            .field("skip_build", &self.skip_build)
            .field("pack_to_temp_dir", &self.pack_to_temp_dir)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Result of packing an extension.
///
/// Owns the temporary workspace used while packing; dropping the artifact
/// removes it together with an archive written there.
#[derive(Debug)]
pub struct PackageArtifact {
    /// Sub-project directories that were packed.
    pub packed_dirs: BTreeSet<PathBuf>,

    /// Every sub-project directory the extension should contain.
    pub all_dirs: BTreeSet<PathBuf>,

    /// Path to the created archive.
    pub package_path: PathBuf,

    workspace: TempDir,
}

/// Packs extension directories.
pub struct Packager<'a> {
    tool: &'a dyn PackageTool,
    rename: Option<(&'a str, &'a dyn Prompter)>,
    temp_root: Option<PathBuf>,
}

/// Holds the original bytes of a `package.json` while its version is stamped,
/// and writes them back on `restore` or on drop.
struct ManifestGuard {
    path: PathBuf,
    original: Vec<u8>,
    restored: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> Packager<'a> {
    /// Create a packager using the given package tool.
    pub fn new(tool: &'a dyn PackageTool) -> Self {
        Self {
            tool,
            rename: None,
            temp_root: None,
        }
    }

    /// Offer to rename sub-project packages to `{developer}.{extension}` before packing.
    pub fn with_dev_name_sync(mut self, developer: &'a str, prompter: &'a dyn Prompter) -> Self {
        self.rename = Some((developer, prompter));
        self
    }

    /// Create temporary workspaces under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    /// Pack an extension directory into `extension.tgz`.
    pub async fn pack(&self, dir: &Path, options: &PackOptions) -> CliResult<PackageArtifact> {
        if !has_extension_manifest(dir) {
            return Err(PackError::ManifestNotFound(dir.to_path_buf()).into());
        }

        if let Some((developer, prompter)) = self.rename {
            offer_dev_name_sync(dir, developer, prompter)?;
        }

        let workspace = self.create_workspace()?;
        let staging = workspace.path().join("package");
        std::fs::create_dir_all(&staging).map_err(PackError::Io)?;
        tracing::debug!("packing {} in {}", dir.display(), workspace.path().display());

        let emit = |event: PackProgress| {
            if let Some(cb) = &options.on_progress {
                cb(event);
            }
        };

        let all_dirs: Vec<PathBuf> = EXTENSION_PARTS.iter().map(|p| dir.join(p)).collect();

        if options.skip_build {
            emit(PackProgress::BuildSkipped);
        } else {
            // Server first, then app.
            for part_dir in all_dirs.iter().rev().filter(|d| has_package_json(d)) {
                let part = part_name(part_dir);
                emit(PackProgress::BuildStarted { part: part.clone() });
                self.tool
                    .build(part_dir)
                    .await
                    .map_err(|e| PackError::BuildFailed {
                        dir: part_dir.clone(),
                        reason: e.to_string(),
                    })?;
                emit(PackProgress::BuildFinished { part });
            }
        }

        emit(PackProgress::PackStarted);

        let packed_dirs: Vec<PathBuf> = all_dirs
            .iter()
            .filter(|d| has_package_json(d))
            .cloned()
            .collect();

        for part_dir in &packed_dirs {
            self.pack_part(part_dir, &staging).await?;
        }

        std::fs::copy(
            dir.join(EXTENSION_MANIFEST_FILE),
            staging.join(EXTENSION_MANIFEST_FILE),
        )
        .map_err(PackError::Io)?;

        let destination_dir = if options.pack_to_temp_dir {
            workspace.path()
        } else {
            dir
        };
        let package_path = destination_dir.join(EXTENSION_ARCHIVE_FILE);
        compress_dir(&staging, &package_path)?;

        emit(PackProgress::PackFinished);

        let artifact = PackageArtifact {
            packed_dirs: packed_dirs.into_iter().collect(),
            all_dirs: all_dirs.into_iter().collect(),
            package_path,
            workspace,
        };

        let missing = artifact.missing_dirs();
        if !missing.is_empty() {
            return Err(PackError::MissingPackageJson { missing }.into());
        }

        Ok(artifact)
    }

    fn create_workspace(&self) -> Result<TempDir, PackError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("shoutem-pack-");
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(PackError::TempDir)
    }

    /// Pack one sub-project into `staging/<part>.tgz` with a stamped version.
    async fn pack_part(&self, part_dir: &Path, staging: &Path) -> CliResult<PathBuf> {
        let suffix = format!("build{}", chrono::Utc::now().timestamp_millis());
        let guard = ManifestGuard::stamp(part_dir, &suffix)?;

        let packed = self.tool.pack(part_dir).await;
        let restored = guard.restore();
        if let Err(e) = &restored {
            tracing::error!(
                "failed to restore {}: {}",
                part_dir.join(PACKAGE_JSON_FILE).display(),
                e
            );
        }

        let tarball = packed.map_err(|e| PackError::PackFailed {
            dir: part_dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        restored.map_err(PackError::Io)?;

        let destination = staging.join(format!("{}.tgz", part_name(part_dir)));
        move_file(&tarball, &destination).map_err(PackError::Io)?;
        Ok(destination)
    }
}

impl PackageArtifact {
    /// Sub-project directories that should have been packed but were not.
    pub fn missing_dirs(&self) -> Vec<PathBuf> {
        self.all_dirs
            .difference(&self.packed_dirs)
            .cloned()
            .collect()
    }

    /// Size of the archive in bytes.
    pub fn size(&self) -> std::io::Result<u64> {
        Ok(std::fs::metadata(&self.package_path)?.len())
    }

    /// SHA-256 checksum of the archive.
    pub fn checksum(&self) -> std::io::Result<String> {
        Ok(compute_sha256(&std::fs::read(&self.package_path)?))
    }

    /// Path of the temporary workspace.
    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    /// Delete the archive and the workspace.
    pub fn remove(self) -> std::io::Result<()> {
        if self.package_path.exists() {
            std::fs::remove_file(&self.package_path)?;
        }
        self.workspace.close()
    }
}

impl ManifestGuard {
    fn stamp(project_dir: &Path, suffix: &str) -> CliResult<Self> {
        let path = project_dir.join(PACKAGE_JSON_FILE);
        let original = std::fs::read(&path)?;
        let mut package: PackageJson = serde_json::from_slice(&original).map_err(PackError::Json)?;

        let guard = Self {
            path,
            original,
            restored: false,
        };

        let version = package.version.as_deref().unwrap_or("0.0.0");
        package.version = Some(format!("{}-{}", version, suffix));
        package.save(project_dir)?;

        Ok(guard)
    }

    fn restore(mut self) -> std::io::Result<()> {
        self.restored = true;
        std::fs::write(&self.path, &self.original)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Rename sub-project packages to `{developer}.{extension}` if the user agrees.
///
/// Returns true when the package files were rewritten.
pub fn offer_dev_name_sync(
    dir: &Path,
    developer: &str,
    prompter: &dyn Prompter,
) -> CliResult<bool> {
    let manifest = ExtensionManifest::load(dir)?;
    let target = CanonicalName::new(developer, &manifest.name).module_name();

    let mut parts = Vec::new();
    for part in EXTENSION_PARTS {
        let part_dir = dir.join(part);
        if has_package_json(&part_dir) {
            let package = PackageJson::load(&part_dir)?;
            parts.push((part_dir, package));
        }
    }

    if parts
        .iter()
        .all(|(_, package)| package.name.as_deref() == Some(target.as_str()))
    {
        return Ok(false);
    }

    let message = "You're uploading an extension that isn't yours, do you want to rename it in the package.json files?";
    if !prompter.confirm(message, true)? {
        return Ok(false);
    }

    for (part_dir, mut package) in parts {
        package.name = Some(target.clone());
        package.save(&part_dir)?;
    }

    tracing::debug!("renamed extension packages to {}", target);
    Ok(true)
}

/// Gzip `dir` into a tarball whose single top-level entry is `package/`.
pub fn compress_dir(dir: &Path, output: &Path) -> Result<(), PackError> {
    let wrap = |source: std::io::Error| PackError::Compress {
        from: dir.to_path_buf(),
        to: output.to_path_buf(),
        source,
    };

    let file = File::create(output).map_err(wrap)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = Builder::new(encoder);
    builder.append_dir_all("package", dir).map_err(wrap)?;
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(wrap)?;

    Ok(())
}

/// Compute SHA-256 hash of bytes.
pub fn compute_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn part_name(part_dir: &Path) -> String {
    part_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Move a file, falling back to copy + delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if !self.restored {
            let _ = std::fs::write(&self.path, &self.original);
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
