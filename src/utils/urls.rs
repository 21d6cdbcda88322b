// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use url::Url;

/// Maximum allowed URL length
const MAX_URL_LENGTH: usize = 2048;

/// Validate an artifact or manifest URL from the configuration
///
/// Checks:
/// - Only allows http/https schemes
/// - Requires a host
/// - Validates URL length
pub fn validate_url(url_str: &str) -> Result<Url> {
    if url_str.len() > MAX_URL_LENGTH {
        return Err(anyhow::anyhow!("URL exceeds maximum length of {} characters", MAX_URL_LENGTH));
    }
    
    let url = Url::parse(url_str)
        .with_context(|| format!("Invalid URL format: {}", url_str))?;
    
    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(anyhow::anyhow!(
                "Invalid URL scheme: {} (only http and https are allowed)",
                scheme
            ));
        }
    }
    
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(anyhow::anyhow!("URL must have a host: {}", url_str));
    }
    
    Ok(url)
}

/// Name of the file an artifact URL points at, as it appears in checksum manifests
///
/// Query string and fragment are ignored and percent-encoding is undone, so
/// `https://host/a/my%20disk.img?x=1` yields `my disk.img`.
pub fn artifact_filename(url_str: &str) -> Result<String> {
    let url = validate_url(url_str)?;
    
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| anyhow::anyhow!("URL does not name a file: {}", url_str))?;
    
    let filename = urlencoding::decode(segment)
        .with_context(|| format!("URL file name is not valid UTF-8: {}", url_str))?;
    
    Ok(filename.into_owned())
}
