//! Archive upload.

use crate::error::CliResult;
use crate::manifest::CanonicalName;
use crate::pack::PackageArtifact;
use crate::registry::{ExtensionRegistry, UploadProgress};
use crate::styles::{Spinner, format_size, upload_progress_bar};
use indicatif::ProgressBar;
use std::sync::{Arc, Mutex};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Streams packed extensions to the extension manager.
pub struct Uploader<'a> {
    registry: &'a dyn ExtensionRegistry,
    show_progress: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> Uploader<'a> {
    pub fn new(registry: &'a dyn ExtensionRegistry) -> Self {
        Self {
            registry,
            show_progress: true,
        }
    }

    /// Disable the progress bar and processing spinner.
    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Upload an artifact and return the id the server assigned to it.
    ///
    /// The artifact is deleted once the upload succeeds.
    pub async fn upload(
        &self,
        artifact: PackageArtifact,
        canonical: &CanonicalName,
    ) -> CliResult<String> {
        let size = artifact.size()?;
        tracing::debug!(
            "uploading {} as {} ({})",
            artifact.package_path.display(),
            canonical,
            format_size(size)
        );

        let bar = if self.show_progress {
            upload_progress_bar(size)
        } else {
            ProgressBar::hidden()
        };
        let processing: Arc<Mutex<Option<Spinner>>> = Arc::new(Mutex::new(None));

        let progress: UploadProgress = {
            let bar = bar.clone();
            let processing = Arc::clone(&processing);
            let show_progress = self.show_progress;
            Arc::new(move |sent, total| {
                bar.set_position(sent);
                if sent >= total && !bar.is_finished() {
                    bar.finish_and_clear();
                    if show_progress && let Ok(mut slot) = processing.lock() {
                        *slot = Some(Spinner::new("Processing upload..."));
                    }
                }
            })
        };

        let result = self
            .registry
            .upload_extension(canonical, &artifact.package_path, Some(progress))
            .await;

        bar.finish_and_clear();
        let spinner = processing.lock().ok().and_then(|mut slot| slot.take());

        let id = match result {
            Ok(id) => {
                if let Some(spinner) = spinner {
                    spinner.succeed(Some(&format!("Uploaded {}", canonical)));
                }
                id
            }
            Err(e) => {
                if let Some(spinner) = spinner {
                    spinner.fail(Some("Upload failed"));
                }
                return Err(e);
            }
        };

        if let Err(e) = artifact.remove() {
            tracing::warn!("failed to remove uploaded archive: {}", e);
        }

        Ok(id)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
