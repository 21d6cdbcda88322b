// SPDX-License-Identifier: GPL-3.0-only
#[allow(clippy::module_inception)]
mod config;
mod deserialize;

pub use config::{ActivationPolicy, Config, ImageSpec};
