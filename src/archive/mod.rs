mod zip;

use crate::cleanup::SharedCleanupContext;
use crate::error::Result;
use crate::runtime::Runtime;
use std::path::{Path, PathBuf};

pub use zip::ZipCodec;

/// Trait for archive formats used to publish and install packages
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveCodec: Send + Sync {
    /// Pack `files` into an in-memory archive. Entry names are the file paths
    /// relative to `root`; files appearing twice are packed once.
    fn pack<R: Runtime + 'static>(&self, runtime: &R, root: &Path, files: &[PathBuf])
    -> Result<Vec<u8>>;

    /// Unpack `bytes` into `dest`, overwriting existing files. `archive_name`
    /// is only used for messages. Returns the number of files written.
    fn unpack<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_name: &str,
        bytes: &[u8],
        dest: &Path,
    ) -> Result<usize>;

    /// Same as [`ArchiveCodec::unpack`], registering the staging directory
    /// with the cleanup context for interruption handling
    fn unpack_with_cleanup<R: Runtime + 'static>(
        &self,
        runtime: &R,
        archive_name: &str,
        bytes: &[u8],
        dest: &Path,
        cleanup_ctx: SharedCleanupContext,
    ) -> Result<usize>;
}
