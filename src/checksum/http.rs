// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};
use crate::checksum::traits::ManifestSource;

/// Fetches checksum manifests over HTTP(S) with a small retry budget
pub struct HttpManifestSource {
    client: Client,
    max_retries: u32,
}

impl HttpManifestSource {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("glance-image-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        
        Ok(Self {
            client,
            max_retries: 3,
        })
    }
    
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
    
    async fn fetch_once(&self, url: &str) -> anyhow::Result<String> {
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        
        Ok(response.text().await?)
    }
}

#[async_trait]
impl ManifestSource for HttpManifestSource {
    async fn fetch(&self, url: &str) -> anyhow::Result<String> {
        let mut last_error = None;
        
        for attempt in 1..=self.max_retries {
            match self.fetch_once(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!(url = %url, attempt, "Manifest fetch succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) => {
                    warn!(url = %url, attempt, error = %e, "Manifest fetch attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(2_u64.pow(attempt))).await;
                    }
                }
            }
        }
        
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Manifest fetch failed after {} attempts", self.max_retries)))
    }
}
