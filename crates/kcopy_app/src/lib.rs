//! Command line front end for kcopy.
pub mod cli;
pub mod report;

use tokio::runtime::{Builder, Runtime};

/// Fetches share one cooperative thread; publish workflows run on the
/// blocking pool.
pub fn runtime() -> std::io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}
