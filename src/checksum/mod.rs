// SPDX-License-Identifier: GPL-3.0-only
pub mod http;
pub mod manifest;
pub mod traits;

pub use http::HttpManifestSource;
pub use manifest::resolve;
pub use traits::ManifestSource;

use anyhow::Context;
use std::io::Cursor;
use tracing::debug;

/// Download the manifest at `checksums_url` and look up the artifact's checksum in it.
///
/// `Ok(None)` means the manifest was fetched but does not mention `filename`.
pub async fn resolve_remote(
    source: &dyn ManifestSource,
    checksums_url: &str,
    filename: &str,
) -> anyhow::Result<Option<String>> {
    let body = source
        .fetch(checksums_url)
        .await
        .with_context(|| format!("Failed to fetch checksum manifest {}", checksums_url))?;

    debug!(url = %checksums_url, bytes = body.len(), filename = %filename, "Scanning checksum manifest");

    resolve(Cursor::new(body.as_bytes()), filename)
        .with_context(|| format!("Failed to read checksum manifest {}", checksums_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StaticManifest;

    #[tokio::test]
    async fn test_resolve_remote_found() {
        let source = StaticManifest::new("SHA256(jammy.img) = 0261f6c6df8c02\n");
        let checksum = resolve_remote(&source, "https://example.com/SHA256SUMS", "jammy.img")
            .await
            .unwrap();
        assert_eq!(checksum.as_deref(), Some("0261f6c6df8c02"));
    }

    #[tokio::test]
    async fn test_resolve_remote_not_listed() {
        let source = StaticManifest::new("0261f6c6df8c02  noble.img\n");
        let checksum = resolve_remote(&source, "https://example.com/SHA256SUMS", "jammy.img")
            .await
            .unwrap();
        assert_eq!(checksum, None);
    }

    #[tokio::test]
    async fn test_resolve_remote_fetch_error() {
        let source = StaticManifest::failing("connection refused");
        let err = resolve_remote(&source, "https://example.com/SHA256SUMS", "jammy.img")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to fetch checksum manifest"));
    }
}
