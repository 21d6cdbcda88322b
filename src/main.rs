// SPDX-License-Identifier: GPL-3.0-only
mod checksum;
mod cli;
mod config;
mod glance;
mod logging;
mod sync;
mod utils;

#[cfg(test)]
mod test_helpers;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use checksum::{HttpManifestSource, ManifestSource};
use cli::Cli;
use config::Config;
use glance::{Credentials, GlanceClient, ImageService};
use logging::setup_logging;
use sync::{install_signal_handler, run_all, CancelFlag, ImageSyncEngine, RunOptions, SyncOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(prefix) = &cli.prefix {
        config.prefix = prefix.clone();
    }

    // Initialize logging
    let log_level = if cli.debug { "debug" } else { config.log_level.as_str() };
    setup_logging(log_level, cli.log_format)?;

    info!("Starting glance-image-sync v{}", env!("CARGO_PKG_VERSION"));

    let filter = cli
        .filter
        .as_deref()
        .filter(|pattern| !pattern.is_empty())
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid --filter pattern")?;

    // Connect to the image service
    let credentials = Credentials::from_env()?;
    let images: Arc<dyn ImageService> = Arc::new(GlanceClient::connect(&credentials).await?);
    let manifests: Arc<dyn ManifestSource> = Arc::new(HttpManifestSource::new()?.with_retries(config.manifest_retries));

    let options = SyncOptions {
        dry_run: cli.dry_run,
        force: cli.force,
        force_private: cli.private,
        delete_old: cli.delete || config.delete,
        activation: config.activation,
    };
    if options.dry_run {
        info!("Dry run: no image will be created, changed or deleted");
    }

    let engine = ImageSyncEngine::new(images, manifests, options);

    let cancel = CancelFlag::new();
    let signal_task = install_signal_handler(cancel.clone());

    let run_options = RunOptions {
        prefix: config.prefix.clone(),
        filter,
        keep_going: cli.keep_going,
    };
    let summary = run_all(&engine, &config.images, &run_options, &cancel).await;

    signal_task.abort();

    if !summary.is_success() {
        for (name, err) in &summary.failed {
            error!(image = %name, error = %err, "Failed");
        }
        anyhow::bail!("{} image(s) failed to synchronize", summary.failed.len());
    }

    if summary.cancelled {
        anyhow::bail!("Run cancelled before all images were processed");
    }

    info!("Shutdown complete");
    Ok(())
}
