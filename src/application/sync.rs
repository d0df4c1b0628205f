//! Sync action - resolve, download and unpack requested packages.
//!
//! Dependencies are processed one after another and independently: a missing
//! version, an unreachable archive or a corrupt download is recorded for that
//! dependency and the batch moves on.

use std::path::Path;

use log::{debug, info, warn};

use super::with_deadline;
use crate::archive::ArchiveCodec;
use crate::cleanup::SharedCleanupContext;
use crate::config::RemoteConfig;
use crate::error::{PmError, Result};
use crate::package::{Dependency, Version, VersionResolver};
use crate::remote::{RemoteRepository, remote_path};
use crate::runtime::Runtime;

/// What happened to one dependency
#[derive(Debug)]
pub enum DependencyOutcome {
    /// The archive was downloaded and unpacked
    Installed {
        version: Version,
        archive: String,
        files: usize,
    },
    /// No remote archive satisfies the requirement
    NoMatchingVersion,
    /// Listing, download or unpack failed
    Failed(PmError),
}

#[derive(Debug)]
pub struct DependencyReport {
    pub dependency: Dependency,
    pub outcome: DependencyOutcome,
}

/// Outcome of every requested dependency, in request order
#[derive(Debug, Default)]
pub struct SyncReport {
    pub results: Vec<DependencyReport>,
}

impl SyncReport {
    /// True when at least one dependency was not installed.
    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|r| !matches!(r.outcome, DependencyOutcome::Installed { .. }))
    }

    pub fn installed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, DependencyOutcome::Installed { .. }))
            .count()
    }
}

/// Sync action - installs the best matching version of each dependency
pub struct SyncAction<'a, R: Runtime + 'static, C: ArchiveCodec> {
    runtime: &'a R,
    codec: &'a C,
    repository: &'a dyn RemoteRepository,
    remote: &'a RemoteConfig,
    cleanup_ctx: SharedCleanupContext,
}

impl<'a, R: Runtime + 'static, C: ArchiveCodec> SyncAction<'a, R, C> {
    pub fn new(
        runtime: &'a R,
        codec: &'a C,
        repository: &'a dyn RemoteRepository,
        remote: &'a RemoteConfig,
        cleanup_ctx: SharedCleanupContext,
    ) -> Self {
        Self {
            runtime,
            codec,
            repository,
            remote,
            cleanup_ctx,
        }
    }

    /// Sync every dependency into `dest`. Never fails as a whole; look at
    /// [`SyncReport::has_failures`] for the overall outcome.
    #[tracing::instrument(skip(self, dependencies))]
    pub async fn sync_all(&self, dependencies: &[Dependency], dest: &Path) -> SyncReport {
        let mut report = SyncReport::default();

        for dependency in dependencies {
            let outcome = match self.sync_dependency(dependency, dest).await {
                Ok(outcome) => outcome,
                Err(PmError::NoMatchingVersion { name, constraint }) => {
                    info!("No matching version for {} {}", name, constraint);
                    DependencyOutcome::NoMatchingVersion
                }
                Err(e) => {
                    warn!("Failed to sync {}: {}", dependency.name, e);
                    DependencyOutcome::Failed(e)
                }
            };

            report.results.push(DependencyReport {
                dependency: dependency.clone(),
                outcome,
            });
        }

        report
    }

    /// Sync a single dependency
    async fn sync_dependency(
        &self,
        dependency: &Dependency,
        dest: &Path,
    ) -> Result<DependencyOutcome> {
        let dir = &self.remote.remote_dir;
        let entries = with_deadline(self.remote.timeout, "list", dir, self.repository.list(dir))
            .await?;

        let mut candidates = Vec::new();
        for entry in entries.iter().filter(|e| !e.is_dir) {
            let Some(raw) = dependency.archive_version(&entry.name) else {
                continue;
            };
            match Version::parse(raw) {
                Ok(version) => candidates.push((version, entry.name.as_str())),
                Err(e) => debug!("Skipping {}: {}", entry.name, e),
            }
        }
        debug!("{} candidate(s) for {}", candidates.len(), dependency.name);

        let best = VersionResolver::resolve(&candidates, &dependency.requirement);
        let Some((version, archive)) = best else {
            return Err(PmError::NoMatchingVersion {
                name: dependency.name.clone(),
                constraint: dependency.requirement.to_string(),
            });
        };

        let path = remote_path(dir, archive);
        info!("Downloading {}", path);
        let bytes = with_deadline(
            self.remote.timeout,
            "download",
            &path,
            self.repository.download(&path),
        )
        .await?;

        let files = self.codec.unpack_with_cleanup(
            self.runtime,
            archive,
            &bytes,
            dest,
            self.cleanup_ctx.clone(),
        )?;

        Ok(DependencyOutcome::Installed {
            version: version.clone(),
            archive: archive.to_string(),
            files,
        })
    }
}
