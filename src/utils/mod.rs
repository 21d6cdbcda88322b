// SPDX-License-Identifier: GPL-3.0-only
pub mod urls;

pub use urls::{artifact_filename, validate_url};
