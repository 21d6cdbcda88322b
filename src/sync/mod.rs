// SPDX-License-Identifier: GPL-3.0-only
pub mod cancel;
pub mod driver;
pub mod engine;
pub mod error;
pub mod rollback;

pub use cancel::{install_signal_handler, CancelFlag};
pub use driver::{run_all, RunOptions};
pub use engine::{ImageSyncEngine, SyncOptions};
