//! Extension publishing.
//!
//! Publishing is upload-then-publish: the extension is checked, its version
//! negotiated against the extension manager, packed, uploaded and finally
//! marked as published. An app the extension lives in can then be offered
//! the new version.

use crate::batch::ExtensionPipeline;
use crate::check::Preflight;
use crate::error::CliResult;
use crate::manifest::{CanonicalName, ExtensionManifest};
use crate::npm::PackageTool;
use crate::pack::{PackOptions, Packager};
use crate::platform::find_app_id;
use crate::prompt::{Prompter, VersionSupplier};
use crate::registry::{AppRegistry, ExtensionRegistry, Lookup, PublishedExtension};
use crate::session::Session;
use crate::styles::Spinner;
use crate::upload::Uploader;
use async_trait::async_trait;
use colored::Colorize;
use std::path::Path;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// States of the version negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionState {
    /// Asking the extension manager whether the version is free.
    Checking(String),
    /// The version is taken; a replacement is needed.
    Rejected { version: String, suggested: String },
    /// The version can be published.
    Accepted(String),
}

/// Options for the per-extension publish pipeline.
#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Skip building sub-projects.
    pub nobuild: bool,
    /// Skip the syntax and dependency checks.
    pub nocheck: bool,
    /// Negotiate a publishable version before uploading.
    pub negotiate_version: bool,
    /// Hide spinners and progress bars.
    pub quiet: bool,
}

/// What came of offering the new version to an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallationOffer {
    /// The extension was installed into the app.
    Installed,
    /// The app's installation now points at the new version.
    Updated { from_version: String },
    /// The app already uses this exact extension version.
    UpToDate,
    /// The user declined.
    Declined,
}

/// Result of uploading one extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedExtension {
    pub id: String,
    pub canonical: CanonicalName,
}

/// Check, pack, upload and publish extensions for one developer session.
pub struct ExtensionPublisher<'a> {
    session: &'a Session,
    registry: &'a dyn ExtensionRegistry,
    tool: &'a dyn PackageTool,
    prompter: &'a dyn Prompter,
    versions: &'a dyn VersionSupplier,
    options: PublishOptions,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> ExtensionPublisher<'a> {
    pub fn new(
        session: &'a Session,
        registry: &'a dyn ExtensionRegistry,
        tool: &'a dyn PackageTool,
        prompter: &'a dyn Prompter,
        versions: &'a dyn VersionSupplier,
        options: PublishOptions,
    ) -> Self {
        Self {
            session,
            registry,
            tool,
            prompter,
            versions,
            options,
        }
    }

    /// Run checks, negotiate the version, pack and upload an extension.
    pub async fn upload_extension(&self, dir: &Path) -> CliResult<UploadedExtension> {
        if !self.options.nocheck {
            let spinner = self.spinner("Checking the extension code for syntax errors");
            let preflight = Preflight::new(self.tool, self.registry);
            let checked = preflight.validate(dir).await;
            finish(spinner, &checked, "Extension checked");
            checked?;
        }

        let manifest = if self.options.negotiate_version {
            prepare_version(dir, self.session.developer_name(), self.registry, self.versions)
                .await?
        } else {
            ExtensionManifest::load(dir)?
        };

        let pack_options = PackOptions {
            skip_build: self.options.nobuild,
            pack_to_temp_dir: true,
            on_progress: None,
        };
        let spinner = self.spinner(format!("Packing {}", manifest.name));
        let packed = Packager::new(self.tool)
            .with_dev_name_sync(self.session.developer_name(), self.prompter)
            .pack(dir, &pack_options)
            .await;
        finish(spinner, &packed, "Extension packed");
        let artifact = packed?;

        let canonical = manifest.canonical_name(self.session.developer_name());
        let mut uploader = Uploader::new(self.registry);
        if self.options.quiet {
            uploader = uploader.quiet();
        }
        let id = uploader.upload(artifact, &canonical).await?;

        Ok(UploadedExtension { id, canonical })
    }

    /// Publish the version currently in the extension's manifest.
    pub async fn publish_extension(&self, dir: &Path) -> CliResult<PublishedExtension> {
        let manifest = ExtensionManifest::load(dir)?;
        let canonical = manifest.canonical_name(self.session.developer_name());

        let spinner = self.spinner(format!("Publishing {}@{}", manifest.name, manifest.version));
        let published = self.registry.publish_extension(&canonical).await;
        finish(
            spinner,
            &published,
            &format!("Published {}@{}", canonical.module_name(), manifest.version),
        );
        published
    }

    /// Offer the published version to the app `dir` belongs to, if any.
    ///
    /// Returns `None` when `dir` is not inside a configured app.
    pub async fn offer_installation(
        &self,
        dir: &Path,
        apps: &dyn AppRegistry,
        published: &PublishedExtension,
    ) -> CliResult<Option<InstallationOffer>> {
        let Some(app_id) = find_app_id(dir)? else {
            return Ok(None);
        };

        let manifest = ExtensionManifest::load(dir)?;
        let canonical = CanonicalName::new(self.session.developer_name(), &manifest.name);

        offer_installation_update(
            apps,
            self.registry,
            self.prompter,
            &app_id,
            &canonical,
            published,
        )
        .await
        .map(Some)
    }

    fn spinner(&self, message: impl Into<String>) -> Option<Spinner> {
        (!self.options.quiet).then(|| Spinner::new(message))
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Find a version of the extension that can still be published.
///
/// Starts from the manifest version and asks `supplier` for replacements
/// until the extension manager accepts one. Replacements that are not valid
/// semantic versions are asked for again.
pub async fn negotiate_version(
    manifest: &ExtensionManifest,
    developer: &str,
    registry: &dyn ExtensionRegistry,
    supplier: &dyn VersionSupplier,
) -> CliResult<String> {
    let mut state = VersionState::Checking(manifest.version.clone());

    loop {
        state = match state {
            VersionState::Checking(version) => {
                let canonical = CanonicalName::new(developer, &manifest.name).with_version(&version);
                if registry.can_publish(&canonical).await? {
                    VersionState::Accepted(version)
                } else {
                    tracing::debug!("version {} of {} is taken", version, manifest.name);
                    VersionState::Rejected {
                        suggested: suggest_next_version(&version),
                        version,
                    }
                }
            }
            VersionState::Rejected { version, suggested } => {
                let answer = supplier.next_version(&version, &suggested)?;
                let answer = answer.trim();
                if semver::Version::parse(answer).is_ok() {
                    VersionState::Checking(answer.to_string())
                } else {
                    VersionState::Rejected { version, suggested }
                }
            }
            VersionState::Accepted(version) => return Ok(version),
        };
    }
}

/// Negotiate a publishable version and write it back to `extension.json`.
pub async fn prepare_version(
    dir: &Path,
    developer: &str,
    registry: &dyn ExtensionRegistry,
    supplier: &dyn VersionSupplier,
) -> CliResult<ExtensionManifest> {
    let mut manifest = ExtensionManifest::load(dir)?;
    let version = negotiate_version(&manifest, developer, registry, supplier).await?;

    if version != manifest.version {
        manifest.version = version;
        manifest.save(dir)?;
    }

    Ok(manifest)
}

/// Next patch version; a prerelease resolves to its release.
pub fn suggest_next_version(version: &str) -> String {
    match semver::Version::parse(version) {
        Ok(mut next) => {
            if next.pre.is_empty() {
                next.patch += 1;
            }
            next.pre = semver::Prerelease::EMPTY;
            next.build = semver::BuildMetadata::EMPTY;
            next.to_string()
        }
        Err(_) => String::new(),
    }
}

/// Offer to install the published extension into an app, or to move the
/// app's installation to it.
pub async fn offer_installation_update(
    apps: &dyn AppRegistry,
    registry: &dyn ExtensionRegistry,
    prompter: &dyn Prompter,
    app_id: &str,
    canonical: &CanonicalName,
    published: &PublishedExtension,
) -> CliResult<InstallationOffer> {
    let module = canonical.module_name();

    match apps.get_installation(app_id, &module).await? {
        Lookup::NotFound => {
            let message = format!(
                "Do you want to install {} extension to the app {}?",
                module, app_id
            );
            if !prompter.confirm(&message, true)? {
                return Ok(InstallationOffer::Declined);
            }
            apps.install_extension(app_id, &published.id).await?;
            Ok(InstallationOffer::Installed)
        }
        Lookup::Found(installation) if installation.extension == published.id => {
            Ok(InstallationOffer::UpToDate)
        }
        Lookup::Found(installation) => {
            let from_version = match registry.get_extension(&installation.extension).await? {
                Lookup::Found(old) => old.version,
                Lookup::NotFound => "?".to_string(),
            };
            let message = format!(
                "Update the version used in the current app ({}@{} => @{})?",
                module, from_version, published.version
            );
            if !prompter.confirm(&message, true)? {
                return Ok(InstallationOffer::Declined);
            }
            apps.update_installation(app_id, &installation.id, &published.id)
                .await?;
            Ok(InstallationOffer::Updated { from_version })
        }
    }
}

fn finish<T>(spinner: Option<Spinner>, result: &CliResult<T>, success: &str) {
    if let Some(spinner) = spinner {
        match result {
            Ok(_) => spinner.succeed(Some(success)),
            Err(_) => spinner.fail(None),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl ExtensionPipeline for ExtensionPublisher<'_> {
    async fn upload(&self, dir: &Path) -> CliResult<()> {
        let uploaded = self.upload_extension(dir).await?;
        if !self.options.quiet {
            println!(
                "  {} Uploaded {} ({})",
                "✓".bright_green(),
                uploaded.canonical.to_string().bright_cyan(),
                uploaded.id.dimmed()
            );
        }
        Ok(())
    }

    async fn publish(&self, dir: &Path) -> CliResult<PublishedExtension> {
        self.publish_extension(dir).await
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Developer;
    use crate::testing::{
        FakeAppRegistry, FakePackageTool, FakeRegistry, ScriptedPrompter, ScriptedVersions,
        write_extension,
    };
    use tempfile::TempDir;

    const PACKAGE: &str = r#"{"name": "acme.gallery", "version": "1.0.0"}"#;

    fn manifest(version: &str) -> ExtensionManifest {
        serde_json::from_value(serde_json::json!({ "name": "gallery", "version": version }))
            .unwrap()
    }

    fn session() -> Session {
        Session::new(
            Developer {
                id: "1".into(),
                name: "acme".into(),
            },
        )
    }

    fn published(id: &str, version: &str) -> PublishedExtension {
        PublishedExtension {
            id: id.into(),
            version: version.into(),
        }
    }

    #[test]
    fn test_suggest_next_version() {
        assert_eq!(suggest_next_version("1.2.3"), "1.2.4");
        assert_eq!(suggest_next_version("2.0.0-beta.1"), "2.0.0");
        assert_eq!(suggest_next_version("latest"), "");
    }

    #[tokio::test]
    async fn test_free_version_is_accepted_without_prompting() {
        let registry = FakeRegistry::new("acme").with_develop("acme.gallery-1.0.0", "5");
        let versions = ScriptedVersions::new(&[]);

        let version = negotiate_version(&manifest("1.0.0"), "acme", &registry, &versions)
            .await
            .unwrap();

        assert_eq!(version, "1.0.0");
        assert!(versions.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_negotiation_loops_until_valid_and_free() {
        let registry = FakeRegistry::new("acme")
            .with_published("acme.gallery-1.0.0", "1")
            .with_published("acme.gallery-1.0.1", "2");
        let versions = ScriptedVersions::new(&["not-a-version", "1.0.1", " 1.0.2 "]);

        let version = negotiate_version(&manifest("1.0.0"), "acme", &registry, &versions)
            .await
            .unwrap();

        assert_eq!(version, "1.0.2");
        assert_eq!(
            versions.prompts(),
            vec![
                ("1.0.0".to_string(), "1.0.1".to_string()),
                ("1.0.0".to_string(), "1.0.1".to_string()),
                ("1.0.1".to_string(), "1.0.2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_negotiation_aborts_when_supplier_gives_up() {
        let registry = FakeRegistry::new("acme").with_published("acme.gallery-1.0.0", "1");
        let versions = ScriptedVersions::new(&[]);

        assert!(
            negotiate_version(&manifest("1.0.0"), "acme", &registry, &versions)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_prepare_version_writes_manifest() {
        let dir = TempDir::new().unwrap();
        write_extension(dir.path(), "gallery", "1.0.0", None, None);
        let registry = FakeRegistry::new("acme").with_published("acme.gallery-1.0.0", "1");
        let versions = ScriptedVersions::new(&["1.1.0"]);

        let manifest = prepare_version(dir.path(), "acme", &registry, &versions)
            .await
            .unwrap();

        assert_eq!(manifest.version, "1.1.0");
        assert_eq!(ExtensionManifest::load(dir.path()).unwrap().version, "1.1.0");
    }

    #[tokio::test]
    async fn test_offer_installs_when_not_installed() {
        let apps = FakeAppRegistry::default();
        let registry = FakeRegistry::new("acme");
        let prompter = ScriptedPrompter::confirming(true);

        let outcome = offer_installation_update(
            &apps,
            &registry,
            &prompter,
            "123",
            &CanonicalName::new("acme", "gallery"),
            &published("ext-2", "1.0.1"),
        )
        .await
        .unwrap();

        assert_eq!(outcome, InstallationOffer::Installed);
        assert_eq!(apps.installs(), vec![("123".to_string(), "ext-2".to_string())]);
    }

    #[tokio::test]
    async fn test_offer_updates_other_version() {
        let apps = FakeAppRegistry::default().with_installation("123", "acme.gallery", "inst-1", "ext-1");
        let registry = FakeRegistry::new("acme").with_published("acme.gallery-1.0.0", "ext-1");
        let prompter = ScriptedPrompter::confirming(true);

        let outcome = offer_installation_update(
            &apps,
            &registry,
            &prompter,
            "123",
            &CanonicalName::new("acme", "gallery"),
            &published("ext-2", "1.0.1"),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            InstallationOffer::Updated {
                from_version: "1.0.0".into()
            }
        );
        assert_eq!(
            apps.updates(),
            vec![("123".to_string(), "inst-1".to_string(), "ext-2".to_string())]
        );
    }

    #[tokio::test]
    async fn test_offer_same_version_and_declined() {
        let apps = FakeAppRegistry::default().with_installation("123", "acme.gallery", "inst-1", "ext-2");
        let registry = FakeRegistry::new("acme");
        let prompter = ScriptedPrompter::confirming(false);
        let canonical = CanonicalName::new("acme", "gallery");

        let outcome = offer_installation_update(
            &apps,
            &registry,
            &prompter,
            "123",
            &canonical,
            &published("ext-2", "1.0.1"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, InstallationOffer::UpToDate);
        assert_eq!(prompter.confirmations(), 0);

        let outcome = offer_installation_update(
            &apps,
            &registry,
            &prompter,
            "123",
            &canonical,
            &published("ext-3", "1.0.2"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, InstallationOffer::Declined);
        assert!(apps.updates().is_empty());
    }

    #[tokio::test]
    async fn test_offer_lookup_failure_propagates() {
        let apps = FakeAppRegistry {
            fail_lookup: true,
            ..Default::default()
        };
        let registry = FakeRegistry::new("acme");
        let prompter = ScriptedPrompter::confirming(true);

        let result = offer_installation_update(
            &apps,
            &registry,
            &prompter,
            "123",
            &CanonicalName::new("acme", "gallery"),
            &published("ext-2", "1.0.1"),
        )
        .await;
        assert!(result.is_err());
        assert!(apps.installs().is_empty());
    }

    #[tokio::test]
    async fn test_upload_then_publish_pipeline() {
        let dir = TempDir::new().unwrap();
        write_extension(dir.path(), "gallery", "1.0.0", Some(PACKAGE), Some(PACKAGE));

        let session = session();
        let registry = FakeRegistry::new("acme").with_published("acme.gallery-1.0.0", "1");
        let tool = FakePackageTool::default();
        let prompter = ScriptedPrompter::confirming(true);
        let versions = ScriptedVersions::new(&["1.0.1"]);
        let options = PublishOptions {
            negotiate_version: true,
            quiet: true,
            ..Default::default()
        };
        let publisher =
            ExtensionPublisher::new(&session, &registry, &tool, &prompter, &versions, options);

        let uploaded = publisher.upload_extension(dir.path()).await.unwrap();
        assert_eq!(uploaded.canonical.to_string(), "acme.gallery-1.0.1");

        let result = publisher.publish_extension(dir.path()).await.unwrap();
        assert_eq!(result.version, "1.0.1");
        assert_eq!(registry.published(), vec!["acme.gallery-1.0.1".to_string()]);

        // Not inside an app: nothing to offer.
        let apps = FakeAppRegistry::default();
        assert_eq!(
            publisher
                .offer_installation(dir.path(), &apps, &result)
                .await
                .unwrap(),
            None
        );
    }
}
