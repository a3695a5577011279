//! Package-manager invocation.
//!
//! Sub-projects are npm packages. Building and packing them goes through the
//! `PackageTool` trait so the packer can be exercised without a Node toolchain.

use crate::constants::PACKAGE_JSON_FILE;
use crate::error::{CliError, CliResult};
use crate::manifest::PackageJson;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Build and pack operations on an npm project.
#[async_trait]
pub trait PackageTool: Send + Sync {
    /// Install dependencies and run the `build` script when one is declared.
    async fn build(&self, project_dir: &Path) -> CliResult<()>;

    /// Pack the project and return the path of the produced tarball.
    async fn pack(&self, project_dir: &Path) -> CliResult<PathBuf>;

    /// Run a script declared in the project's `package.json`.
    async fn run_script(&self, project_dir: &Path, script: &str) -> CliResult<()>;
}

/// `PackageTool` backed by the `npm` executable.
#[derive(Debug, Clone)]
pub struct Npm {
    program: String,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Npm {
    /// Use `npm` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: "npm".to_string(),
        }
    }

    /// Run `npm install` in a directory, forwarding output to the terminal.
    pub async fn install(&self, cwd: &Path) -> CliResult<()> {
        self.status(cwd, &["install"], "install").await
    }

    /// Run `npm run <script> [-- args]` in a directory.
    pub async fn run(&self, cwd: &Path, script: &str, args: &[String]) -> CliResult<()> {
        let mut full: Vec<&str> = vec!["run", script];
        if !args.is_empty() {
            full.push("--");
            full.extend(args.iter().map(String::as_str));
        }
        self.status(cwd, &full, &format!("run {}", script)).await
    }

    async fn status(&self, cwd: &Path, args: &[&str], what: &str) -> CliResult<()> {
        tracing::debug!("{} {} (in {})", self.program, args.join(" "), cwd.display());

        let status = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            .env("FORCE_COLOR", "true")
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| CliError::Generic(format!("Failed to run {}: {}", self.program, e)))?;

        if !status.success() {
            return Err(CliError::Generic(format!(
                "`{} {}` failed in {} with exit code: {}",
                self.program,
                what,
                cwd.display(),
                status.code().unwrap_or(-1)
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl PackageTool for Npm {
    async fn build(&self, project_dir: &Path) -> CliResult<()> {
        if !project_dir.join(PACKAGE_JSON_FILE).is_file() {
            return Ok(());
        }

        self.install(project_dir).await?;

        if PackageJson::load(project_dir)?.has_script("build") {
            self.run(project_dir, "build", &[]).await?;
        }

        Ok(())
    }

    async fn pack(&self, project_dir: &Path) -> CliResult<PathBuf> {
        tracing::debug!("{} pack (in {})", self.program, project_dir.display());

        let output = Command::new(&self.program)
            .arg("pack")
            .current_dir(project_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .await
            .map_err(|e| CliError::Generic(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CliError::Generic(format!(
                "`{} pack` failed in {} with exit code: {}",
                self.program,
                project_dir.display(),
                output.status.code().unwrap_or(-1)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let file_name = tarball_name(&stdout).ok_or_else(|| {
            CliError::Generic(format!(
                "`{} pack` did not report a tarball in {}",
                self.program,
                project_dir.display()
            ))
        })?;

        Ok(project_dir.join(file_name))
    }

    async fn run_script(&self, project_dir: &Path, script: &str) -> CliResult<()> {
        self.run(project_dir, script, &[]).await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The tarball name is the last non-empty line `npm pack` prints.
fn tarball_name(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for Npm {
    fn default() -> Self {
        Self::new()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tarball_name_takes_last_line() {
        assert_eq!(
            tarball_name("> prepack\nsome output\nacme.gallery-1.0.0-build1.tgz\n"),
            Some("acme.gallery-1.0.0-build1.tgz")
        );
        assert_eq!(tarball_name("\n  \n"), None);
    }
}
