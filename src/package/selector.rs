//! Expansion of package targets into concrete file lists.

use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::PackageTarget;
use crate::error::{PmError, Result};
use crate::runtime::{Runtime, normalize_path};

/// Expands [`PackageTarget`]s relative to a root directory.
pub struct FileSelector<'a, R: Runtime> {
    runtime: &'a R,
    root: PathBuf,
}

impl<'a, R: Runtime> FileSelector<'a, R> {
    pub fn new(runtime: &'a R, root: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            root: root.into(),
        }
    }

    /// Expand every target in order.
    ///
    /// A target matching nothing is not an error. Paths are normalized, and a
    /// file matched by several targets is listed once, at its first match.
    #[tracing::instrument(skip(self, targets))]
    pub fn select(&self, targets: &[PackageTarget]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();

        for target in targets {
            compile(&target.pattern)?;
            let exclude = target.exclude.as_deref().map(compile).transpose()?;

            let full_pattern = self.anchor(&target.pattern);
            let matches = self
                .runtime
                .glob(&full_pattern)
                .map_err(|e| PmError::InvalidPattern {
                    pattern: target.pattern.clone(),
                    reason: format!("{:#}", e),
                })?;

            if matches.is_empty() {
                debug!("Pattern {:?} matched no files", target.pattern);
            }

            for path in matches {
                if let Some(exclude) = &exclude
                    && excluded_by(exclude, &path)
                {
                    debug!("Excluding {:?}", path);
                    continue;
                }
                let path = normalize_path(&path);
                if seen.insert(path.clone()) {
                    files.push(path);
                }
            }
        }

        Ok(files)
    }

    /// Anchor a relative pattern at the root. The root itself is escaped so
    /// glob metacharacters in directory names are taken literally.
    fn anchor(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            return pattern.to_string();
        }
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        format!("{}/{}", root.trim_end_matches('/'), pattern)
    }
}

fn compile(pattern: &str) -> Result<glob::Pattern> {
    glob::Pattern::new(pattern).map_err(|e| PmError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn excluded_by(exclude: &glob::Pattern, path: &Path) -> bool {
    path.file_name()
        .map(|name| exclude.matches(&name.to_string_lossy()))
        .unwrap_or(false)
}
