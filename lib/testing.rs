//! Test doubles for the seam traits.

use crate::constants::{DEVELOP_TAG, EXTENSION_MANIFEST_FILE, PACKAGE_JSON_FILE};
use crate::error::{CliError, CliResult};
use crate::manifest::{CanonicalName, PackageJson};
use crate::npm::PackageTool;
use crate::prompt::{Prompter, VersionSupplier};
use crate::registry::{
    AppRegistry, Developer, ExtensionRegistry, Installation, Lookup, PublishedExtension,
    RemoteExtension, UploadProgress,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Package tool that records calls and writes placeholder tarballs.
#[derive(Default)]
pub struct FakePackageTool {
    /// Sub-project name whose build fails.
    pub fail_build: Option<String>,
    /// Sub-project name whose pack fails.
    pub fail_pack: Option<String>,
    /// Sub-project name whose scripts fail.
    pub fail_script: Option<String>,
    pub(crate) scripts: Mutex<Vec<(PathBuf, String)>>,
    pub(crate) built: Mutex<Vec<PathBuf>>,
    pub(crate) packed: Mutex<Vec<PathBuf>>,
    pub(crate) versions: Mutex<Vec<String>>,
}

/// Prompter that answers every confirmation the same way.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub(crate) answer: bool,
    pub(crate) selection: Option<Vec<PathBuf>>,
    pub(crate) text: String,
    pub(crate) asked: AtomicUsize,
}

/// Version supplier that replays a list of answers.
#[derive(Default)]
pub struct ScriptedVersions {
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(String, String)>>,
}

/// In-memory extension registry.
pub struct FakeRegistry {
    developer: Mutex<Option<Developer>>,
    created_developers: Mutex<Vec<String>>,
    extensions: Mutex<HashMap<String, RemoteExtension>>,
    uploads: Mutex<Vec<String>>,
    published: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

/// In-memory app registry.
#[derive(Default)]
pub struct FakeAppRegistry {
    pub(crate) installations: Mutex<HashMap<(String, String), Installation>>,
    pub(crate) fail_lookup: bool,
    pub(crate) installs: Mutex<Vec<(String, String)>>,
    pub(crate) updates: Mutex<Vec<(String, String, String)>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl FakePackageTool {
    pub fn built(&self) -> Vec<PathBuf> {
        self.built.lock().unwrap().clone()
    }

    pub fn packed(&self) -> Vec<PathBuf> {
        self.packed.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<(PathBuf, String)> {
        self.scripts.lock().unwrap().clone()
    }

    /// Versions found in `package.json` while each pack ran.
    pub fn packed_versions(&self) -> Vec<String> {
        self.versions.lock().unwrap().clone()
    }
}

impl ScriptedPrompter {
    pub fn confirming(answer: bool) -> Self {
        Self {
            answer,
            ..Default::default()
        }
    }

    /// Confirm everything and pick `selection` from multiselects.
    pub fn selecting(selection: Vec<PathBuf>) -> Self {
        Self {
            answer: true,
            selection: Some(selection),
            ..Default::default()
        }
    }

    /// Confirm everything and answer text prompts with `text`.
    pub fn answering(text: &str) -> Self {
        Self {
            answer: true,
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn confirmations(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl ScriptedVersions {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// `(rejected, suggested)` pairs the supplier was asked with.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

impl FakeRegistry {
    pub fn new(developer: &str) -> Self {
        let registry = Self::unregistered();
        *registry.developer.lock().unwrap() = Some(Developer {
            id: "1".into(),
            name: developer.into(),
        });
        registry
    }

    /// Registry for an account without a developer.
    pub fn unregistered() -> Self {
        Self {
            developer: Mutex::new(None),
            created_developers: Mutex::new(Vec::new()),
            extensions: Mutex::new(HashMap::new()),
            uploads: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
            failing: HashSet::new(),
        }
    }

    /// Record an extension version as already published.
    pub fn with_published(self, canonical: &str, id: &str) -> Self {
        self.insert(canonical, id, Some("production"));
        self
    }

    /// Record an extension version as uploaded but not published.
    pub fn with_develop(self, canonical: &str, id: &str) -> Self {
        self.insert(canonical, id, Some(DEVELOP_TAG));
        self
    }

    /// Make uploads and publishes of an extension (by its bare name) fail.
    pub fn failing(mut self, extension: &str) -> Self {
        self.failing.insert(extension.to_string());
        self
    }

    pub fn created_developers(&self) -> Vec<String> {
        self.created_developers.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }

    fn insert(&self, canonical: &str, id: &str, tag: Option<&str>) {
        let version = canonical.rsplit_once('-').map(|(_, v)| v).unwrap_or("");
        self.extensions.lock().unwrap().insert(
            canonical.to_string(),
            RemoteExtension {
                id: id.to_string(),
                version: version.to_string(),
                tag: tag.map(String::from),
            },
        );
    }

    fn check_failing(&self, canonical: &CanonicalName, operation: &str) -> CliResult<()> {
        if self.failing.contains(&canonical.extension) {
            return Err(CliError::Remote {
                operation: operation.into(),
                status: 500,
                message: "unavailable".into(),
            });
        }
        Ok(())
    }
}

impl FakeAppRegistry {
    pub fn with_installation(self, app_id: &str, canonical: &str, id: &str, ext_id: &str) -> Self {
        self.installations.lock().unwrap().insert(
            (app_id.to_string(), canonical.to_string()),
            Installation {
                id: id.into(),
                extension: ext_id.into(),
            },
        );
        self
    }

    pub fn installs(&self) -> Vec<(String, String)> {
        self.installs.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(String, String, String)> {
        self.updates.lock().unwrap().clone()
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Write an extension tree with optional `app`/`server` package files.
pub fn write_extension(
    dir: &Path,
    name: &str,
    version: &str,
    app_package: Option<&str>,
    server_package: Option<&str>,
) {
    std::fs::write(
        dir.join(EXTENSION_MANIFEST_FILE),
        format!("{{\n  \"name\": \"{}\",\n  \"version\": \"{}\"\n}}\n", name, version),
    )
    .unwrap();

    for (part, package) in [("app", app_package), ("server", server_package)] {
        if let Some(content) = package {
            std::fs::create_dir_all(dir.join(part)).unwrap();
            std::fs::write(dir.join(part).join(PACKAGE_JSON_FILE), content).unwrap();
        }
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl PackageTool for FakePackageTool {
    async fn build(&self, project_dir: &Path) -> CliResult<()> {
        self.built.lock().unwrap().push(project_dir.to_path_buf());
        if self.fail_build.as_deref() == Some(dir_name(project_dir).as_str()) {
            return Err(CliError::Generic("build script exited with 1".into()));
        }
        Ok(())
    }

    async fn pack(&self, project_dir: &Path) -> CliResult<PathBuf> {
        self.packed.lock().unwrap().push(project_dir.to_path_buf());
        let package = PackageJson::load(project_dir)?;
        self.versions
            .lock()
            .unwrap()
            .push(package.version.unwrap_or_default());

        if self.fail_pack.as_deref() == Some(dir_name(project_dir).as_str()) {
            return Err(CliError::Generic("pack exited with 1".into()));
        }

        let tarball = project_dir.join("package.tgz");
        std::fs::write(&tarball, dir_name(project_dir))?;
        Ok(tarball)
    }

    async fn run_script(&self, project_dir: &Path, script: &str) -> CliResult<()> {
        self.scripts
            .lock()
            .unwrap()
            .push((project_dir.to_path_buf(), script.to_string()));
        if self.fail_script.as_deref() == Some(dir_name(project_dir).as_str()) {
            return Err(CliError::Generic(format!("{} exited with 1", script)));
        }
        Ok(())
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, _message: &str, _default: bool) -> CliResult<bool> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer)
    }

    fn select_paths(&self, _message: &str, paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
        Ok(self.selection.clone().unwrap_or_else(|| paths.to_vec()))
    }

    fn input(&self, _message: &str) -> CliResult<String> {
        Ok(self.text.clone())
    }
}

impl VersionSupplier for ScriptedVersions {
    fn next_version(&self, rejected: &str, suggested: &str) -> CliResult<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((rejected.to_string(), suggested.to_string()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(CliError::Cancelled)
    }
}

#[async_trait]
impl ExtensionRegistry for FakeRegistry {
    async fn get_developer(&self) -> CliResult<Lookup<Developer>> {
        Ok(match self.developer.lock().unwrap().clone() {
            Some(developer) => Lookup::Found(developer),
            None => Lookup::NotFound,
        })
    }

    async fn create_developer(&self, name: &str) -> CliResult<Developer> {
        let developer = Developer {
            id: "2".into(),
            name: name.into(),
        };
        self.created_developers.lock().unwrap().push(name.to_string());
        *self.developer.lock().unwrap() = Some(developer.clone());
        Ok(developer)
    }

    async fn upload_extension(
        &self,
        canonical: &CanonicalName,
        archive: &Path,
        on_progress: Option<UploadProgress>,
    ) -> CliResult<String> {
        self.check_failing(canonical, "Upload")?;
        let size = std::fs::metadata(archive)?.len();
        if let Some(cb) = on_progress {
            cb(size, size);
        }

        let name = canonical.to_string();
        let id = format!("id-{}", name);
        self.insert(&name, &id, Some(DEVELOP_TAG));
        self.uploads.lock().unwrap().push(name);
        Ok(id)
    }

    async fn get_extension(&self, name_or_id: &str) -> CliResult<Lookup<RemoteExtension>> {
        let extensions = self.extensions.lock().unwrap();
        let found = extensions
            .get(name_or_id)
            .or_else(|| extensions.values().find(|e| e.id == name_or_id));
        Ok(match found {
            Some(ext) => Lookup::Found(ext.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn publish_extension(&self, canonical: &CanonicalName) -> CliResult<PublishedExtension> {
        self.check_failing(canonical, "Publish")?;
        let name = canonical.to_string();
        let mut extensions = self.extensions.lock().unwrap();
        let ext = extensions.get_mut(&name).ok_or_else(|| CliError::Remote {
            operation: "Publish".into(),
            status: 404,
            message: format!("{} was never uploaded", name),
        })?;
        ext.tag = None;
        let published = PublishedExtension {
            id: ext.id.clone(),
            version: ext.version.clone(),
        };
        drop(extensions);

        self.published.lock().unwrap().push(name);
        Ok(published)
    }
}

#[async_trait]
impl AppRegistry for FakeAppRegistry {
    async fn get_installation(
        &self,
        app_id: &str,
        canonical: &str,
    ) -> CliResult<Lookup<Installation>> {
        if self.fail_lookup {
            return Err(CliError::Remote {
                operation: "Fetch installation".into(),
                status: 500,
                message: "unavailable".into(),
            });
        }
        Ok(
            match self
                .installations
                .lock()
                .unwrap()
                .get(&(app_id.to_string(), canonical.to_string()))
            {
                Some(installation) => Lookup::Found(installation.clone()),
                None => Lookup::NotFound,
            },
        )
    }

    async fn install_extension(&self, app_id: &str, extension_id: &str) -> CliResult<()> {
        self.installs
            .lock()
            .unwrap()
            .push((app_id.to_string(), extension_id.to_string()));
        Ok(())
    }

    async fn update_installation(
        &self,
        app_id: &str,
        installation_id: &str,
        extension_id: &str,
    ) -> CliResult<()> {
        self.updates.lock().unwrap().push((
            app_id.to_string(),
            installation_id.to_string(),
            extension_id.to_string(),
        ));
        Ok(())
    }
}
