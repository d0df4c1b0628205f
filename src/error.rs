//! Error kinds reported by the publish and sync workflows.
//!
//! Capabilities underneath (runtime, transports, HTTP) report `anyhow::Error`
//! with context; the workflows classify those failures into one of the kinds
//! below so callers can decide how to react (abort publish, isolate a sync
//! dependency, pick an exit code).

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = PmError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PmError {
    /// Malformed or missing configuration fields.
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A glob pattern (target or exclusion) could not be compiled.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A selected file vanished or could not be read while packing.
    #[error("cannot read {}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Writing an extracted file or directory failed.
    #[error("cannot write {}", path.display())]
    FileUnwritable {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// A selected file does not live under the packing root.
    #[error("{} is outside of {}", path.display(), root.display())]
    FileOutsideRoot { path: PathBuf, root: PathBuf },

    /// Targets matched nothing, so there is nothing to publish.
    #[error("no files matched the package targets")]
    NoFilesSelected,

    /// The archive stream is unreadable, or an entry tried to escape the destination.
    #[error("corrupt archive {archive}: {reason}")]
    ArchiveCorrupt {
        archive: String,
        reason: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Listing, upload or download failed or timed out.
    #[error("remote repository unavailable while trying to {operation} {target}")]
    RemoteUnavailable {
        operation: &'static str,
        target: String,
        #[source]
        source: anyhow::Error,
    },

    /// No remote archive satisfies the requested constraint.
    #[error("no matching version for {name} {constraint}")]
    NoMatchingVersion { name: String, constraint: String },
}

impl PmError {
    pub fn config(message: impl Into<String>) -> Self {
        PmError::ConfigInvalid {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(message: impl Into<String>, source: anyhow::Error) -> Self {
        PmError::ConfigInvalid {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        PmError::FileUnreadable {
            path: path.into(),
            source,
        }
    }

    pub fn unwritable(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        PmError::FileUnwritable {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(archive: impl Into<String>, reason: impl Into<String>) -> Self {
        PmError::ArchiveCorrupt {
            archive: archive.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub fn remote(operation: &'static str, target: impl Into<String>, source: anyhow::Error) -> Self {
        PmError::RemoteUnavailable {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Short machine-friendly name of the kind, printed with sync failures.
    pub fn kind(&self) -> &'static str {
        match self {
            PmError::ConfigInvalid { .. } => "ConfigInvalid",
            PmError::InvalidPattern { .. } => "InvalidPattern",
            PmError::FileUnreadable { .. } => "FileUnreadable",
            PmError::FileUnwritable { .. } => "FileUnwritable",
            PmError::FileOutsideRoot { .. } => "FileOutsideRoot",
            PmError::NoFilesSelected => "NoFilesSelected",
            PmError::ArchiveCorrupt { .. } => "ArchiveCorrupt",
            PmError::RemoteUnavailable { .. } => "RemoteUnavailable",
            PmError::NoMatchingVersion { .. } => "NoMatchingVersion",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_display_includes_context() {
        let err = PmError::corrupt("foo-1.0.zip", "entry escapes destination");
        assert_eq!(
            err.to_string(),
            "corrupt archive foo-1.0.zip: entry escapes destination"
        );

        let err = PmError::NoMatchingVersion {
            name: "foo".into(),
            constraint: ">=2.0".into(),
        };
        assert_eq!(err.to_string(), "no matching version for foo >=2.0");
    }

    #[test]
    fn test_remote_error_chains_source() {
        let err = PmError::remote("list", "/packages", anyhow::anyhow!("connection refused"));
        assert_eq!(err.kind(), "RemoteUnavailable");
        let source = err.source().expect("source should be chained");
        assert_eq!(source.to_string(), "connection refused");
    }

    #[test]
    fn test_config_error_without_source() {
        let err = PmError::config("package name is empty");
        assert_eq!(err.kind(), "ConfigInvalid");
        assert!(err.source().is_none());
    }
}
