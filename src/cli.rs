// SPDX-License-Identifier: GPL-3.0-only
use clap::Parser;
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Keep Glance images in sync with published cloud images
#[derive(Debug, Parser)]
#[command(name = "glance-image-sync")]
#[command(version)]
pub struct Cli {
    /// Image definitions file [default: images.yml, or $IMAGESYNC_CONFIG]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Do not perform changing actions
    #[arg(long = "dryrun", alias = "dry-run")]
    pub dry_run: bool,

    /// Delete old images instead of only changing visibility to private
    #[arg(long)]
    pub delete: bool,

    /// Force uploading new image even if checksum matches
    #[arg(long)]
    pub force: bool,

    /// Force image visibility to private
    #[arg(long)]
    pub private: bool,

    /// Only process images matching this glob pattern
    #[arg(long)]
    pub filter: Option<String>,

    /// Prefix all image names (overrides the configuration file)
    #[arg(long)]
    pub prefix: Option<String>,

    /// Continue with the remaining images after a failure
    #[arg(long)]
    pub keep_going: bool,
}
