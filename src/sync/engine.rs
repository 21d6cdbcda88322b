// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::checksum::{resolve_remote, ManifestSource};
use crate::config::{ActivationPolicy, ImageSpec};
use crate::glance::{
    ImageService, ImageStatus, NewImage, RemoteImage, Visibility, PROVENANCE_CHECKSUM_KEY,
};
use crate::sync::cancel::CancelFlag;
use crate::sync::error::{reason, SyncError};
use crate::sync::rollback::PendingImage;
use crate::utils::artifact_filename;

/// Run-wide switches for the engine
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Stop after deciding, log what would be created
    pub dry_run: bool,

    /// Import even when an image with the same checksum exists
    pub force: bool,

    /// Never make new images public
    pub force_private: bool,

    /// Delete superseded images instead of making them private
    pub delete_old: bool,

    pub activation: ActivationPolicy,
}

/// Whether the catalog already holds the published artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    UpToDate { image_id: String },
    NeedsSync { forced: bool },
}

/// Result of a synchronization that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// An image with the published checksum already exists
    UpToDate { image_id: String },

    /// A sync was needed but dry-run suppressed it
    DryRun,

    /// A new image was imported and is active
    Synced {
        image_id: String,
        /// New image was made public
        promoted: bool,
        /// Superseded images made private or deleted
        retired: usize,
        /// Superseded images that could not be retired
        retire_failures: usize,
    },
}

/// Compare the catalog against the freshly resolved checksum
///
/// Only active images count as matches.
pub fn decide(current: &[RemoteImage], checksum: &str, force: bool) -> SyncDecision {
    for image in current {
        let got = image.comparison_checksum().unwrap_or_default();

        if image.status != ImageStatus::Active {
            debug!(
                id = %image.id,
                status = %image.status,
                got = %got,
                "Image is not active, not a match"
            );
            continue;
        }

        if got == checksum {
            if force {
                info!(id = %image.id, "Image up-to-date but forced to update image.");
                return SyncDecision::NeedsSync { forced: true };
            }
            info!(id = %image.id, "Image up-to-date. Skip.");
            return SyncDecision::UpToDate { image_id: image.id.clone() };
        }

        debug!(id = %image.id, expected = %checksum, got = %got, "Checksum match failed");
    }

    SyncDecision::NeedsSync { forced: false }
}

/// Drives one image through list, resolve, decide, create, import, activate, promote and retire
pub struct ImageSyncEngine {
    images: Arc<dyn ImageService>,
    manifests: Arc<dyn ManifestSource>,
    options: SyncOptions,
}

impl ImageSyncEngine {
    pub fn new(
        images: Arc<dyn ImageService>,
        manifests: Arc<dyn ManifestSource>,
        options: SyncOptions,
    ) -> Self {
        Self {
            images,
            manifests,
            options,
        }
    }

    /// Whether a new image for `spec` should end up public
    fn wants_public(&self, spec: &ImageSpec) -> bool {
        !self.options.force_private && spec.visibility == Visibility::Public
    }

    /// Synchronize the catalog entry `name` with the artifact described by `spec`
    pub async fn sync(
        &self,
        name: &str,
        spec: &ImageSpec,
        cancel: &CancelFlag,
    ) -> Result<SyncOutcome, SyncError> {
        info!("Fetch image details...");
        debug!(?spec, "Image configuration");

        let current = self.list_current(name, spec).await?;
        debug!(count = current.len(), "Found images matching name");

        let checksum = self.resolve_checksum(name, spec).await?;

        let forced = match decide(&current, &checksum, self.options.force) {
            SyncDecision::UpToDate { image_id } => return Ok(SyncOutcome::UpToDate { image_id }),
            SyncDecision::NeedsSync { forced } => forced,
        };
        info!(checksum = %checksum, forced, "Image needs sync");

        let request = self.new_image(name, spec, &checksum);
        debug!(?request, "Image create request");

        if self.options.dry_run {
            info!(url = %spec.image_url, replaces = current.len(), "Would create and import new image. Skip.");
            return Ok(SyncOutcome::DryRun);
        }

        let created = self
            .images
            .create_image(&request)
            .await
            .map_err(|e| SyncError::CreationFailed {
                name: name.to_string(),
                reason: reason(&e),
            })?;
        info!(id = %created.id, "Created new image");

        let pending = PendingImage::new(self.images.as_ref(), name, created.id);
        let activated = self.import_and_activate(name, spec, pending.id(), cancel).await;
        if let Err(err) = activated {
            pending.rollback().await;
            return Err(err);
        }
        let image_id = pending.commit();

        let promoted = self.promote(name, spec, &image_id).await;

        let (retired, retire_failures) = if self.wants_public(spec) && !promoted {
            warn!(id = %image_id, "New image is not public, keeping previous images untouched");
            (0, 0)
        } else {
            self.retire(name, &current, &image_id).await
        };

        info!(id = %image_id, promoted, retired, retire_failures, "Image synchronized");
        Ok(SyncOutcome::Synced {
            image_id,
            promoted,
            retired,
            retire_failures,
        })
    }

    async fn list_current(&self, name: &str, spec: &ImageSpec) -> Result<Vec<RemoteImage>, SyncError> {
        debug!("Getting remote image details...");

        let scope = self.wants_public(spec).then_some(Visibility::Public);
        self.images
            .list_images(name, scope)
            .await
            .map_err(|e| SyncError::ListFailed {
                name: name.to_string(),
                reason: reason(&e),
            })
    }

    async fn resolve_checksum(&self, name: &str, spec: &ImageSpec) -> Result<String, SyncError> {
        debug!(algorithm = %spec.checksum_algorithm, url = %spec.checksums_url, "Getting remote checksum details...");

        let failed = |reason: String| SyncError::ResolutionFailed {
            name: name.to_string(),
            reason,
        };

        let filename = artifact_filename(&spec.image_url).map_err(|e| failed(reason(&e)))?;
        let checksum = resolve_remote(self.manifests.as_ref(), &spec.checksums_url, &filename)
            .await
            .map_err(|e| failed(reason(&e)))?;

        checksum.ok_or_else(|| failed(format!("no checksum for {} in {}", filename, spec.checksums_url)))
    }

    fn new_image(&self, name: &str, spec: &ImageSpec, checksum: &str) -> NewImage {
        let mut properties = spec.properties.clone();
        properties.insert(PROVENANCE_CHECKSUM_KEY.to_string(), checksum.to_string());

        NewImage {
            name: name.to_string(),
            disk_format: spec.disk_format.clone(),
            container_format: spec.container_format.clone(),
            visibility: Visibility::Private,
            min_disk: spec.min_disk,
            min_ram: spec.min_ram,
            properties,
        }
    }

    async fn import_and_activate(
        &self,
        name: &str,
        spec: &ImageSpec,
        id: &str,
        cancel: &CancelFlag,
    ) -> Result<RemoteImage, SyncError> {
        self.images
            .import_from_url(id, &spec.image_url)
            .await
            .map_err(|e| SyncError::ImportFailed {
                name: name.to_string(),
                id: id.to_string(),
                reason: reason(&e),
            })?;

        info!("Waiting for import to complete...");
        self.wait_until_active(name, id, cancel).await
    }

    /// Poll the image at a fixed interval until it is active or the attempt budget is spent
    async fn wait_until_active(
        &self,
        name: &str,
        id: &str,
        cancel: &CancelFlag,
    ) -> Result<RemoteImage, SyncError> {
        let policy = self.options.activation;
        let mut last_status = String::from("unknown");
        let aborted = || SyncError::ActivationAborted {
            name: name.to_string(),
            id: id.to_string(),
        };

        for attempt in 1..=policy.attempts {
            if cancel.is_cancelled() {
                return Err(aborted());
            }

            tokio::time::sleep(policy.interval).await;

            if cancel.is_cancelled() {
                return Err(aborted());
            }

            match self.images.get_image(id).await {
                Ok(image) if image.status == ImageStatus::Active => return Ok(image),
                Ok(image) if image.status.is_failed() => {
                    return Err(SyncError::ActivationFailed {
                        name: name.to_string(),
                        id: id.to_string(),
                        status: image.status.to_string(),
                    });
                }
                Ok(image) => {
                    debug!(id = %id, attempt, status = %image.status, "Image status is not active yet");
                    last_status = image.status.to_string();
                }
                Err(e) => {
                    debug!(id = %id, attempt, error = %reason(&e), "Image status check failed");
                    last_status = format!("error: {}", reason(&e));
                }
            }
        }

        Err(SyncError::ActivationTimeout {
            name: name.to_string(),
            id: id.to_string(),
            attempts: policy.attempts,
            last_status,
        })
    }

    /// Make the new image public when wanted. Returns whether it is public now.
    async fn promote(&self, name: &str, spec: &ImageSpec, id: &str) -> bool {
        if !self.wants_public(spec) {
            debug!(id = %id, "Image stays private");
            return false;
        }

        info!("Publish new image...");
        match self.images.set_visibility(id, Visibility::Public).await {
            Ok(()) => true,
            Err(e) => {
                let err = SyncError::PromotionFailed {
                    name: name.to_string(),
                    id: id.to_string(),
                    reason: reason(&e),
                };
                error!(error = %err, "Promotion failed, image remains private");
                false
            }
        }
    }

    /// Make every superseded image private, or delete it. Returns (retired, failed).
    async fn retire(&self, name: &str, previous: &[RemoteImage], new_id: &str) -> (usize, usize) {
        let old: Vec<_> = previous.iter().filter(|image| image.id != new_id).collect();
        if old.is_empty() {
            return (0, 0);
        }

        if self.options.delete_old {
            info!(count = old.len(), "Delete old images...");
        } else {
            info!(count = old.len(), "Update old images to private...");
        }

        let mut retired = 0;
        let mut failed = 0;

        for image in old {
            let result = if self.options.delete_old {
                self.images.delete_image(&image.id).await
            } else {
                self.images.set_visibility(&image.id, Visibility::Private).await
            };

            match result {
                Ok(()) => retired += 1,
                Err(e) => {
                    let err = SyncError::RetirementFailed {
                        name: name.to_string(),
                        id: image.id.clone(),
                        reason: reason(&e),
                    };
                    error!(error = %err, "Old image left unchanged");
                    failed += 1;
                }
            }
        }

        (retired, failed)
    }
}
