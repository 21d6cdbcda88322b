// SPDX-License-Identifier: GPL-3.0-only
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::deserialize::deserialize_ordered;
use crate::glance::Visibility;
use crate::utils::{artifact_filename, validate_url};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "images.yml";

/// One published image to mirror into the catalog
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageSpec {
    /// Artifact download URL handed to the image service for import
    pub image_url: String,

    /// Checksum manifest listing the artifact
    pub checksums_url: String,

    /// Algorithm the manifest uses. Informational; the manifest dialect is detected per line.
    #[serde(default = "default_checksums_algo", rename = "checksums_algo")]
    pub checksum_algorithm: String,

    /// Extra image properties set on creation
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default = "default_disk_format")]
    pub disk_format: String,

    #[serde(default = "default_container_format")]
    pub container_format: String,

    /// Visibility the image should end up with once active
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,

    /// Minimum disk size in GB
    #[serde(default)]
    pub min_disk: u32,

    /// Minimum RAM in MB
    #[serde(default)]
    pub min_ram: u32,
}

/// How long to wait for an import to become active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActivationPolicy {
    /// Pause before every status check
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Number of status checks before giving up
    #[serde(default = "default_poll_attempts")]
    pub attempts: u32,
}

impl Default for ActivationPolicy {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            attempts: default_poll_attempts(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Prepended to every image name before lookup and creation
    #[serde(default)]
    pub prefix: String,

    /// Delete superseded images instead of making them private
    #[serde(default)]
    pub delete: bool,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub activation: ActivationPolicy,

    /// Attempts per checksum manifest download
    #[serde(default = "default_manifest_retries")]
    pub manifest_retries: u32,

    /// Images to synchronize, in file order
    #[serde(default, deserialize_with = "deserialize_ordered")]
    pub images: Vec<(String, ImageSpec)>,
}

fn default_checksums_algo() -> String {
    "sha256".to_string()
}

fn default_disk_format() -> String {
    "qcow2".to_string()
}

fn default_container_format() -> String {
    "bare".to_string()
}

fn default_visibility() -> Visibility {
    Visibility::Public
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_attempts() -> u32 {
    150
}

fn default_manifest_retries() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a YAML file with environment variable overrides
    ///
    /// The path is `explicit` when given, else `IMAGESYNC_CONFIG`, else `images.yml`.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => std::env::var("IMAGESYNC_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read configuration file {}", config_path.display()))?;

        let mut config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid configuration file {}", config_path.display()))?;

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Apply `IMAGESYNC_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("IMAGESYNC_PREFIX") {
            self.prefix = val;
        }
        if let Some(val) = lookup("IMAGESYNC_LOG_LEVEL") {
            self.log_level = val;
        }
    }

    /// Reject configurations the sync engine cannot act on
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.activation.attempts == 0 {
            return Err(anyhow::anyhow!("activation.attempts must be at least 1"));
        }

        for (name, image) in &self.images {
            image
                .validate()
                .with_context(|| format!("Invalid definition for image '{}'", name))?;
        }

        Ok(())
    }
}

impl ImageSpec {
    fn validate(&self) -> anyhow::Result<()> {
        artifact_filename(&self.image_url).context("image_url")?;
        validate_url(&self.checksums_url).context("checksums_url")?;

        match self.visibility {
            Visibility::Public | Visibility::Private => Ok(()),
            other => Err(anyhow::anyhow!(
                "visibility must be public or private, got {}",
                other
            )),
        }
    }
}
