// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;

#[async_trait]
pub trait ManifestSource: Send + Sync {
    /// Fetch the checksum manifest published at `url` as text
    async fn fetch(&self, url: &str) -> anyhow::Result<String>;
}
