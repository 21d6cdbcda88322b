// SPDX-License-Identifier: GPL-3.0-only
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ImageSpec;
use crate::sync::cancel::CancelFlag;
use crate::sync::engine::{ImageSyncEngine, SyncOutcome};
use crate::sync::error::SyncError;

/// How the configured images are walked
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Prepended to every configured key to form the catalog name
    pub prefix: String,

    /// Only keys matching this pattern are processed
    pub filter: Option<glob::Pattern>,

    /// Continue with the next image after a fatal error
    pub keep_going: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub synced: Vec<String>,
    pub up_to_date: Vec<String>,
    pub dry_run: Vec<String>,
    pub filtered: Vec<String>,
    pub failed: Vec<(String, SyncError)>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Synchronize every configured image, one after another, in configuration order
pub async fn run_all(
    engine: &ImageSyncEngine,
    images: &[(String, ImageSpec)],
    options: &RunOptions,
    cancel: &CancelFlag,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for (key, spec) in images {
        if cancel.is_cancelled() {
            warn!("Cancellation requested, not starting further images");
            summary.cancelled = true;
            break;
        }

        let name = format!("{}{}", options.prefix, key);

        if let Some(filter) = &options.filter {
            if !filter.matches(key) {
                debug!(image = %name, "Image does not match filter. Skip.");
                summary.filtered.push(name);
                continue;
            }
        }

        let span = info_span!("image", image = %name);
        match engine.sync(&name, spec, cancel).instrument(span).await {
            Ok(SyncOutcome::Synced { .. }) => summary.synced.push(name),
            Ok(SyncOutcome::UpToDate { .. }) => summary.up_to_date.push(name),
            Ok(SyncOutcome::DryRun) => summary.dry_run.push(name),
            Err(err) => {
                error!(image = %name, error = %err, rolled_back = err.is_rolled_back(), "Image synchronization failed");
                let halt = err.is_fatal() && !options.keep_going;
                summary.failed.push((name, err));
                if halt {
                    break;
                }
            }
        }
    }

    info!(
        synced = summary.synced.len(),
        up_to_date = summary.up_to_date.len(),
        dry_run = summary.dry_run.len(),
        filtered = summary.filtered.len(),
        failed = summary.failed.len(),
        cancelled = summary.cancelled,
        "Run finished"
    );

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActivationPolicy;
    use crate::sync::engine::SyncOptions;
    use crate::test_helpers::{image_spec, Call, MockImageService, StaticManifest};
    use std::sync::Arc;
    use std::time::Duration;

    fn engine(service: &Arc<MockImageService>) -> ImageSyncEngine {
        let manifests = Arc::new(StaticManifest::new("0261f6c6df8c02  jammy.img\n"));
        let options = SyncOptions {
            activation: ActivationPolicy {
                interval: Duration::from_millis(1),
                attempts: 3,
            },
            ..SyncOptions::default()
        };
        ImageSyncEngine::new(service.clone(), manifests, options)
    }

    fn images(keys: &[&str]) -> Vec<(String, ImageSpec)> {
        keys.iter().map(|key| (key.to_string(), image_spec())).collect()
    }

    fn listed_names(service: &MockImageService) -> Vec<String> {
        service
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::List { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_processes_images_in_order_with_prefix() {
        let service = Arc::new(MockImageService::new());
        let options = RunOptions {
            prefix: "CI ".to_string(),
            ..RunOptions::default()
        };

        let summary = run_all(&engine(&service), &images(&["b", "a"]), &options, &CancelFlag::new()).await;

        assert!(summary.is_success());
        assert_eq!(summary.synced, vec!["CI b".to_string(), "CI a".to_string()]);
        assert_eq!(listed_names(&service), vec!["CI b".to_string(), "CI a".to_string()]);
    }

    #[tokio::test]
    async fn test_filter_matches_unprefixed_key() {
        let service = Arc::new(MockImageService::new());
        let options = RunOptions {
            prefix: "CI ".to_string(),
            filter: Some(glob::Pattern::new("Ubuntu*").unwrap()),
            keep_going: false,
        };

        let summary = run_all(
            &engine(&service),
            &images(&["Ubuntu 22.04", "Debian 12", "Ubuntu 24.04"]),
            &options,
            &CancelFlag::new(),
        )
        .await;

        assert_eq!(summary.synced, vec!["CI Ubuntu 22.04".to_string(), "CI Ubuntu 24.04".to_string()]);
        assert_eq!(summary.filtered, vec!["CI Debian 12".to_string()]);
    }

    #[tokio::test]
    async fn test_halts_on_first_failure() {
        let service = Arc::new(MockImageService::new());
        service.fail_import();

        let summary = run_all(&engine(&service), &images(&["a", "b"]), &RunOptions::default(), &CancelFlag::new()).await;

        assert!(!summary.is_success());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "a");
        assert_eq!(listed_names(&service), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_keep_going_continues_after_failure() {
        let service = Arc::new(MockImageService::new());
        service.fail_import();
        let options = RunOptions {
            keep_going: true,
            ..RunOptions::default()
        };

        let summary = run_all(&engine(&service), &images(&["a", "b"]), &options, &CancelFlag::new()).await;

        assert_eq!(summary.failed.len(), 2);
        assert_eq!(service.deletes(), vec!["img-1".to_string(), "img-2".to_string()]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_image() {
        let service = Arc::new(MockImageService::new());
        let cancel = CancelFlag::new();
        service.cancel_on_get(1, cancel.clone());

        let summary = run_all(&engine(&service), &images(&["a", "b"]), &RunOptions::default(), &cancel).await;

        assert!(summary.cancelled);
        assert_eq!(summary.synced, vec!["a".to_string()]);
        assert_eq!(listed_names(&service), vec!["a".to_string()]);
    }
}
