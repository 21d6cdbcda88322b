// SPDX-License-Identifier: GPL-3.0-only
pub mod auth;
pub mod client;
pub mod models;
pub mod traits;

pub use auth::Credentials;
pub use client::GlanceClient;
pub use models::{ImageStatus, NewImage, RemoteImage, Visibility, PROVENANCE_CHECKSUM_KEY};
pub use traits::ImageService;
