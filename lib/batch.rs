//! Batch push and publish over many extension directories.
//!
//! Every extension goes through the pipeline on its own: a failure is
//! reported and recorded, and the batch moves on to the next one.

use crate::constants::EXTENSION_MANIFEST_FILE;
use crate::error::{CliError, CliResult};
use crate::prompt::Prompter;
use crate::registry::PublishedExtension;
use async_trait::async_trait;
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Per-extension steps driven by the batch.
#[async_trait]
pub trait ExtensionPipeline: Send + Sync {
    /// Check, pack and upload the extension in `dir`.
    async fn upload(&self, dir: &Path) -> CliResult<()>;

    /// Publish the uploaded version of the extension in `dir`.
    async fn publish(&self, dir: &Path) -> CliResult<PublishedExtension>;
}

/// Batch flags.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Treat every candidate as already uploaded.
    pub nopush: bool,
    /// Process every candidate without asking.
    pub noconfirm: bool,
    /// Environment name shown in the selection prompt.
    pub target: Option<String>,
}

/// Outcome of pushing a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushReport {
    pub pushed: Vec<PathBuf>,
    pub not_pushed: Vec<PathBuf>,
}

/// Outcome of publishing a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub published: Vec<PathBuf>,
    pub not_published: Vec<PathBuf>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PushReport {
    /// Fail with `BatchIncomplete` if anything was not pushed.
    pub fn into_result(self) -> CliResult<Self> {
        if self.not_pushed.is_empty() {
            Ok(self)
        } else {
            Err(CliError::BatchIncomplete {
                failed: self.not_pushed.len(),
                total: self.pushed.len() + self.not_pushed.len(),
            })
        }
    }
}

impl PublishReport {
    /// Fail with `BatchIncomplete` if anything was not published.
    pub fn into_result(self) -> CliResult<Self> {
        if self.not_published.is_empty() {
            Ok(self)
        } else {
            Err(CliError::BatchIncomplete {
                failed: self.not_published.len(),
                total: self.published.len() + self.not_published.len(),
            })
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Expand glob patterns into a flat list of paths without duplicates.
///
/// Order follows the patterns, then the matches of each pattern. A pattern
/// that is not a valid glob is taken as a literal path.
pub fn expand_globs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for pattern in patterns {
        let matches: Vec<PathBuf> = match glob::glob(pattern) {
            Ok(entries) => entries.filter_map(Result::ok).collect(),
            Err(e) => {
                tracing::debug!("invalid glob {}: {}", pattern, e);
                let path = PathBuf::from(pattern);
                if path.exists() { vec![path] } else { Vec::new() }
            }
        };

        for path in matches {
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
    }

    paths
}

/// Upload every selected extension, isolating failures.
pub async fn push_all(
    paths: &[PathBuf],
    options: &BatchOptions,
    pipeline: &dyn ExtensionPipeline,
    prompter: &dyn Prompter,
) -> CliResult<PushReport> {
    let candidates: Vec<PathBuf> = paths
        .iter()
        .filter(|p| p.join(EXTENSION_MANIFEST_FILE).is_file())
        .cloned()
        .collect();

    if candidates.is_empty() {
        println!("No extensions found in current directory.");
        return Ok(PushReport::default());
    }

    if options.nopush {
        return Ok(PushReport {
            pushed: candidates,
            not_pushed: Vec::new(),
        });
    }

    let selected = if options.noconfirm {
        candidates
    } else {
        let target = options.target.as_deref().unwrap_or("the server");
        prompter.select_paths(
            &format!("Check extensions you want to push to {}", target),
            &candidates,
        )?
    };

    let cwd = std::env::current_dir()?;
    let mut report = PushReport::default();

    for path in selected {
        let path = if path.is_absolute() { path } else { cwd.join(path) };

        match pipeline.upload(&path).await {
            Ok(()) => report.pushed.push(path),
            Err(e) => {
                report_failure(&path, &e);
                report.not_pushed.push(path);
            }
        }
    }

    print_partition("Pushed:", &report.pushed);
    print_partition("Not pushed:", &report.not_pushed);

    Ok(report)
}

/// Push, then publish every pushed extension, isolating failures.
pub async fn publish_multiple(
    paths: &[PathBuf],
    options: &BatchOptions,
    pipeline: &dyn ExtensionPipeline,
    prompter: &dyn Prompter,
) -> CliResult<PublishReport> {
    let pushed = push_all(paths, options, pipeline, prompter).await?;

    let mut report = PublishReport::default();
    for path in pushed.pushed {
        match pipeline.publish(&path).await {
            Ok(published) => {
                tracing::debug!("published {} as {}", path.display(), published.id);
                report.published.push(path);
            }
            Err(e) => {
                report_failure(&path, &e);
                report.not_published.push(path);
            }
        }
    }
    report.not_published.extend(pushed.not_pushed);

    print_partition("Published:", &report.published);
    print_partition("Not published:", &report.not_published);

    Ok(report)
}

fn report_failure(path: &Path, error: &CliError) {
    eprintln!(
        "  {} {}: {}",
        "✗".bright_red(),
        path.display().to_string().bold(),
        error
    );
}

fn print_partition(title: &str, paths: &[PathBuf]) {
    if paths.is_empty() {
        return;
    }
    println!("\n{}", title);
    for path in paths {
        println!("  {}", path.display());
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingPipeline {
        fail_upload: Vec<String>,
        fail_publish: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingPipeline {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn step(&self, step: &str, dir: &Path, failing: &[String]) -> CliResult<()> {
            let name = dir.file_name().unwrap().to_string_lossy().to_string();
            self.calls.lock().unwrap().push(format!("{} {}", step, name));
            if failing.contains(&name) {
                return Err(CliError::Generic(format!("{} of {} failed", step, name)));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ExtensionPipeline for RecordingPipeline {
        async fn upload(&self, dir: &Path) -> CliResult<()> {
            self.step("upload", dir, &self.fail_upload)
        }

        async fn publish(&self, dir: &Path) -> CliResult<PublishedExtension> {
            self.step("publish", dir, &self.fail_publish)?;
            Ok(PublishedExtension {
                id: "1".into(),
                version: "1.0.0".into(),
            })
        }
    }

    fn extensions(root: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let dir = root.join(name);
                std::fs::create_dir_all(&dir).unwrap();
                std::fs::write(
                    dir.join(EXTENSION_MANIFEST_FILE),
                    format!(r#"{{"name":"{}","version":"1.0.0"}}"#, name),
                )
                .unwrap();
                dir
            })
            .collect()
    }

    fn noconfirm() -> BatchOptions {
        BatchOptions {
            noconfirm: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_upload_failure_is_isolated() {
        let root = TempDir::new().unwrap();
        let paths = extensions(root.path(), &["a", "b", "c"]);
        let pipeline = RecordingPipeline {
            fail_upload: vec!["b".into()],
            ..Default::default()
        };

        let report = push_all(&paths, &noconfirm(), &pipeline, &ScriptedPrompter::default())
            .await
            .unwrap();

        assert_eq!(report.pushed, vec![paths[0].clone(), paths[2].clone()]);
        assert_eq!(report.not_pushed, vec![paths[1].clone()]);
        assert_eq!(pipeline.calls(), vec!["upload a", "upload b", "upload c"]);
        assert!(matches!(
            report.into_result(),
            Err(CliError::BatchIncomplete { failed: 1, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_nopush_passes_everything_through() {
        let root = TempDir::new().unwrap();
        let paths = extensions(root.path(), &["a", "b"]);
        let pipeline = RecordingPipeline::default();
        let options = BatchOptions {
            nopush: true,
            ..Default::default()
        };

        let report = push_all(&paths, &options, &pipeline, &ScriptedPrompter::default())
            .await
            .unwrap();

        assert_eq!(report.pushed, paths);
        assert!(report.not_pushed.is_empty());
        assert!(pipeline.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_extension_dirs_are_skipped() {
        let root = TempDir::new().unwrap();
        let plain = root.path().join("docs");
        std::fs::create_dir_all(&plain).unwrap();
        let pipeline = RecordingPipeline::default();

        let report = push_all(&[plain], &noconfirm(), &pipeline, &ScriptedPrompter::default())
            .await
            .unwrap();

        assert_eq!(report, PushReport::default());
        assert!(pipeline.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_selected_extensions_are_pushed() {
        let root = TempDir::new().unwrap();
        let paths = extensions(root.path(), &["a", "b", "c"]);
        let pipeline = RecordingPipeline::default();
        let prompter = ScriptedPrompter::selecting(vec![paths[2].clone()]);

        let report = push_all(&paths, &BatchOptions::default(), &pipeline, &prompter)
            .await
            .unwrap();

        assert_eq!(report.pushed, vec![paths[2].clone()]);
        assert_eq!(pipeline.calls(), vec!["upload c"]);
    }

    #[tokio::test]
    async fn test_publish_failures_come_before_push_failures() {
        let root = TempDir::new().unwrap();
        let paths = extensions(root.path(), &["a", "b", "c", "d"]);
        let pipeline = RecordingPipeline {
            fail_upload: vec!["a".into()],
            fail_publish: vec!["c".into()],
            ..Default::default()
        };

        let report =
            publish_multiple(&paths, &noconfirm(), &pipeline, &ScriptedPrompter::default())
                .await
                .unwrap();

        assert_eq!(report.published, vec![paths[1].clone(), paths[3].clone()]);
        assert_eq!(report.not_published, vec![paths[2].clone(), paths[0].clone()]);
        assert!(report.clone().into_result().is_err());
    }

    #[test]
    fn test_overlapping_globs_are_deduplicated() {
        let root = TempDir::new().unwrap();
        let paths = extensions(root.path(), &["alpha", "beta"]);
        let base = root.path().display().to_string();

        let expanded = expand_globs(&[
            format!("{}/alpha", base),
            format!("{}/*", base),
            format!("{}/a*", base),
        ]);

        assert_eq!(expanded, vec![paths[0].clone(), paths[1].clone()]);
    }
}
