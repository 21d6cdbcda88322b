// SPDX-License-Identifier: GPL-3.0-only

/// Failures of a single image synchronization
///
/// Every variant names the catalog image and, once one exists, the ID of the
/// image the engine created.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Listing the current catalog entries failed.
    #[error("failed to list images named '{name}': {reason}")]
    ListFailed { name: String, reason: String },

    /// The checksum manifest could not be fetched, read, or does not list the artifact.
    #[error("failed to resolve checksum for '{name}': {reason}")]
    ResolutionFailed { name: String, reason: String },

    /// The image record could not be created. Nothing was left behind.
    #[error("failed to create image '{name}': {reason}")]
    CreationFailed { name: String, reason: String },

    /// Triggering the URL import failed. The new image was rolled back.
    #[error("failed to import image '{name}' ({id}): {reason}")]
    ImportFailed { name: String, id: String, reason: String },

    /// The import did not become active within the polling budget. Rolled back.
    #[error("image '{name}' ({id}) not active after {attempts} checks (last status: {last_status})")]
    ActivationTimeout {
        name: String,
        id: String,
        attempts: u32,
        last_status: String,
    },

    /// The import ended in a status it cannot recover from. Rolled back.
    #[error("image '{name}' ({id}) import ended with status {status}")]
    ActivationFailed { name: String, id: String, status: String },

    /// Waiting for activation was cancelled. Rolled back.
    #[error("waiting for image '{name}' ({id}) to become active was aborted")]
    ActivationAborted { name: String, id: String },

    /// The active image could not be made public. It stays private and in place.
    #[error("failed to publish image '{name}' ({id}): {reason}")]
    PromotionFailed { name: String, id: String, reason: String },

    /// A superseded image could not be made private or deleted.
    #[error("failed to retire image '{name}' ({id}): {reason}")]
    RetirementFailed { name: String, id: String, reason: String },
}

impl SyncError {
    /// Whether the error stops the synchronization of its image
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::PromotionFailed { .. } | SyncError::RetirementFailed { .. }
        )
    }

    /// Whether the engine deleted the image it created before reporting the error
    pub fn is_rolled_back(&self) -> bool {
        matches!(
            self,
            SyncError::ImportFailed { .. }
                | SyncError::ActivationTimeout { .. }
                | SyncError::ActivationFailed { .. }
                | SyncError::ActivationAborted { .. }
        )
    }
}

/// Render an error with its full context chain
pub(crate) fn reason(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}
