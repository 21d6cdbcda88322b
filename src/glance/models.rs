// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Custom property holding the manifest checksum an image was created from
pub const PROVENANCE_CHECKSUM_KEY: &str = "int:original-checksum";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
    Shared,
    Community,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Shared => "shared",
            Visibility::Community => "community",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status reported by the image service
///
/// Unknown values are kept verbatim so newer service releases do not break listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageStatus {
    Queued,
    Saving,
    Uploading,
    Importing,
    Active,
    Killed,
    Deleted,
    PendingDelete,
    Deactivated,
    Other(String),
}

impl ImageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ImageStatus::Queued => "queued",
            ImageStatus::Saving => "saving",
            ImageStatus::Uploading => "uploading",
            ImageStatus::Importing => "importing",
            ImageStatus::Active => "active",
            ImageStatus::Killed => "killed",
            ImageStatus::Deleted => "deleted",
            ImageStatus::PendingDelete => "pending_delete",
            ImageStatus::Deactivated => "deactivated",
            ImageStatus::Other(s) => s,
        }
    }
    
    /// Statuses an import never recovers from
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            ImageStatus::Killed | ImageStatus::Deleted | ImageStatus::PendingDelete
        )
    }
}

impl From<String> for ImageStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "queued" => ImageStatus::Queued,
            "saving" => ImageStatus::Saving,
            "uploading" => ImageStatus::Uploading,
            "importing" => ImageStatus::Importing,
            "active" => ImageStatus::Active,
            "killed" => ImageStatus::Killed,
            "deleted" => ImageStatus::Deleted,
            "pending_delete" => ImageStatus::PendingDelete,
            "deactivated" => ImageStatus::Deactivated,
            _ => ImageStatus::Other(value),
        }
    }
}

impl From<ImageStatus> for String {
    fn from(value: ImageStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image as reported by the image service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteImage {
    /// Service-assigned identifier
    pub id: String,
    
    #[serde(default)]
    pub name: Option<String>,
    
    pub status: ImageStatus,
    
    pub visibility: Visibility,
    
    /// Content checksum computed by the service (MD5), absent until data is uploaded
    #[serde(default)]
    pub checksum: Option<String>,
    
    /// Every other attribute, custom properties included
    #[serde(flatten)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl RemoteImage {
    /// Checksum to compare against the manifest.
    ///
    /// The recorded provenance checksum wins over the service's own checksum.
    pub fn comparison_checksum(&self) -> Option<&str> {
        self.properties
            .get(PROVENANCE_CHECKSUM_KEY)
            .and_then(|value| value.as_str())
            .or(self.checksum.as_deref())
    }
}

/// Body of an image create request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewImage {
    pub name: String,
    pub disk_format: String,
    pub container_format: String,
    pub visibility: Visibility,
    pub min_disk: u32,
    pub min_ram: u32,
    #[serde(flatten)]
    pub properties: BTreeMap<String, String>,
}
