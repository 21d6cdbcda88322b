// SPDX-License-Identifier: GPL-3.0-only
use tracing::{debug, error, info, warn};
use crate::glance::ImageService;

/// A freshly created image that is not yet known to be usable
///
/// Must end in either [`PendingImage::commit`] once the image is active, or
/// [`PendingImage::rollback`] which deletes it. Dropping it in between leaves the
/// image behind and is reported as a warning.
pub struct PendingImage<'a> {
    service: &'a dyn ImageService,
    name: String,
    id: String,
    armed: bool,
}

impl<'a> PendingImage<'a> {
    pub fn new(service: &'a dyn ImageService, name: &str, id: String) -> Self {
        Self {
            service,
            name: name.to_string(),
            id,
            armed: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Keep the image. Returns its ID.
    pub fn commit(mut self) -> String {
        self.armed = false;
        std::mem::take(&mut self.id)
    }

    /// Delete the image. Failures are logged only, the caller reports the original error.
    pub async fn rollback(mut self) {
        self.armed = false;
        debug!(image = %self.name, id = %self.id, "Rollback image resource...");

        match self.service.delete_image(&self.id).await {
            Ok(()) => info!(image = %self.name, id = %self.id, "Rolled back new image"),
            Err(e) => error!(image = %self.name, id = %self.id, error = %format!("{:#}", e), "Failed to roll back new image"),
        }
    }
}

impl Drop for PendingImage<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(image = %self.name, id = %self.id, "New image neither committed nor rolled back, it is left in place");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Call, MockImageService};

    #[tokio::test]
    async fn test_commit_keeps_image() {
        let service = MockImageService::new();
        let pending = PendingImage::new(&service, "ubuntu", "img-1".to_string());

        assert_eq!(pending.commit(), "img-1");
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rollback_deletes_image() {
        let service = MockImageService::new();
        let pending = PendingImage::new(&service, "ubuntu", "img-1".to_string());

        pending.rollback().await;
        assert_eq!(service.calls(), vec![Call::Delete("img-1".to_string())]);
    }

    #[tokio::test]
    async fn test_rollback_failure_is_swallowed() {
        let service = MockImageService::new();
        service.fail_delete("img-1");
        let pending = PendingImage::new(&service, "ubuntu", "img-1".to_string());

        pending.rollback().await;
        assert_eq!(service.calls(), vec![Call::Delete("img-1".to_string())]);
    }
}
