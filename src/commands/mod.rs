//! Command entry points used by the `pm` binary.
//!
//! Each command loads its configuration, opens the repository, runs the
//! matching action and prints a short summary.

use anyhow::Result;
use std::path::PathBuf;

mod publish;
mod sync;

pub use publish::publish;
pub use sync::sync;

/// Render an error with its chain of causes on one line.
fn describe(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Resolve the directory commands operate in.
fn working_dir<R: crate::runtime::Runtime>(runtime: &R, dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => runtime.current_dir(),
    }
}
