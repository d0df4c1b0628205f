//! Publish action - select, pack and upload one package version.

use std::path::Path;

use log::{debug, info};

use super::with_deadline;
use crate::archive::ArchiveCodec;
use crate::config::{PublishConfig, RemoteConfig};
use crate::error::{PmError, Result};
use crate::package::{FileSelector, archive_name};
use crate::remote::{RemoteRepository, remote_path};
use crate::runtime::Runtime;

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// Archive file name, `<name>-<version>.zip`
    pub archive: String,
    /// Where the archive was stored in the repository
    pub remote_path: String,
    /// Number of files packed
    pub files: usize,
    /// Archive size in bytes
    pub size: usize,
}

/// Publish action - all or nothing: any failure aborts before or during the
/// upload, and nothing is uploaded unless the archive was fully built.
pub struct PublishAction<'a, R: Runtime + 'static, C: ArchiveCodec> {
    runtime: &'a R,
    codec: &'a C,
    repository: &'a dyn RemoteRepository,
    remote: &'a RemoteConfig,
}

impl<'a, R: Runtime + 'static, C: ArchiveCodec> PublishAction<'a, R, C> {
    pub fn new(
        runtime: &'a R,
        codec: &'a C,
        repository: &'a dyn RemoteRepository,
        remote: &'a RemoteConfig,
    ) -> Self {
        Self {
            runtime,
            codec,
            repository,
            remote,
        }
    }

    /// Publish the package described by `config`, with targets and archive
    /// entries relative to `root`.
    #[tracing::instrument(skip(self, config), fields(name = %config.name, version = %config.version))]
    pub async fn publish(&self, config: &PublishConfig, root: &Path) -> Result<PublishResult> {
        for packet in &config.packets {
            debug!("Bundled package: {}", packet);
        }

        let files = FileSelector::new(self.runtime, root).select(&config.targets)?;
        if files.is_empty() {
            return Err(PmError::NoFilesSelected);
        }
        info!("Packing {} file(s) for {}", files.len(), config.name);

        let bytes = self.codec.pack(self.runtime, root, &files)?;

        let archive = archive_name(&config.name, &config.version);
        let path = remote_path(&self.remote.remote_dir, &archive);
        let size = bytes.len();

        info!("Uploading {} ({} bytes)", path, size);
        with_deadline(
            self.remote.timeout,
            "upload",
            &path,
            self.repository.upload(&path, bytes),
        )
        .await?;

        Ok(PublishResult {
            archive,
            remote_path: path,
            files: files.len(),
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{MockArchiveCodec, ZipCodec};
    use crate::package::PackageTarget;
    use crate::remote::{MemoryRepository, MockRemoteRepository};
    use crate::runtime::RealRuntime;
    use std::fs;
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn publish_config(targets: Vec<PackageTarget>) -> PublishConfig {
        PublishConfig {
            name: "tools".to_string(),
            version: "1.10".to_string(),
            targets,
            packets: vec![],
        }
    }

    fn remote_config() -> RemoteConfig {
        RemoteConfig::new("memory")
    }

    #[tokio::test]
    async fn test_publish_uploads_archive() {
        let work = tempdir().unwrap();
        fs::create_dir_all(work.path().join("bin")).unwrap();
        fs::write(work.path().join("bin/tool"), "#!/bin/sh\n").unwrap();
        fs::write(work.path().join("a.txt"), "a").unwrap();
        fs::write(work.path().join("secret.txt"), "s").unwrap();

        let repository = MemoryRepository::new();
        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &ZipCodec, &repository, &remote);

        let config = publish_config(vec![
            PackageTarget::new("bin/*"),
            PackageTarget::new("*.txt").excluding("secret.txt"),
        ]);
        let result = action.publish(&config, work.path()).await.unwrap();

        assert_eq!(result.archive, "tools-1.10.zip");
        assert_eq!(result.remote_path, "/packages/tools-1.10.zip");
        assert_eq!(result.files, 2);
        assert_eq!(repository.paths(), vec!["/packages/tools-1.10.zip"]);

        let bytes = repository.get("/packages/tools-1.10.zip").unwrap();
        assert_eq!(bytes.len(), result.size);
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<_> = archive.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "bin/tool"]);
    }

    #[tokio::test]
    async fn test_publish_counts_overlapping_matches_once() {
        let work = tempdir().unwrap();
        fs::write(work.path().join("a.txt"), "a").unwrap();
        fs::write(work.path().join("a.md"), "# a").unwrap();

        let repository = MemoryRepository::new();
        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &ZipCodec, &repository, &remote);

        let config = publish_config(vec![
            PackageTarget::new("*.txt"),
            PackageTarget::new("a.*"),
        ]);
        let result = action.publish(&config, work.path()).await.unwrap();

        assert_eq!(result.files, 2);
        let bytes = repository.get("/packages/tools-1.10.zip").unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), result.files);
    }

    #[tokio::test]
    async fn test_publish_without_files_uploads_nothing() {
        let work = tempdir().unwrap();

        let mut repository = MockRemoteRepository::new();
        repository.expect_upload().never();

        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &ZipCodec, &repository, &remote);

        let err = action
            .publish(&publish_config(vec![PackageTarget::new("*.txt")]), work.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PmError::NoFilesSelected));
    }

    #[tokio::test]
    async fn test_publish_invalid_pattern() {
        let work = tempdir().unwrap();

        let mut repository = MockRemoteRepository::new();
        repository.expect_upload().never();

        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &ZipCodec, &repository, &remote);

        let err = action
            .publish(&publish_config(vec![PackageTarget::new("[unclosed")]), work.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PmError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn test_publish_pack_failure_uploads_nothing() {
        let work = tempdir().unwrap();
        fs::write(work.path().join("a.txt"), "a").unwrap();

        let mut codec = MockArchiveCodec::new();
        codec
            .expect_pack::<RealRuntime>()
            .times(1)
            .returning(|_, _, files: &[PathBuf]| {
                Err(PmError::unreadable(
                    files[0].clone(),
                    anyhow::anyhow!("vanished"),
                ))
            });

        let mut repository = MockRemoteRepository::new();
        repository.expect_upload().never();

        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &codec, &repository, &remote);

        let err = action
            .publish(&publish_config(vec![PackageTarget::new("*.txt")]), work.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PmError::FileUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_publish_upload_failure_is_remote_unavailable() {
        let work = tempdir().unwrap();
        fs::write(work.path().join("a.txt"), "a").unwrap();

        let mut repository = MockRemoteRepository::new();
        repository
            .expect_upload()
            .withf(|path, _| path == "/packages/tools-1.10.zip")
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("connection reset")));

        let remote = remote_config();
        let action = PublishAction::new(&RealRuntime, &ZipCodec, &repository, &remote);

        let err = action
            .publish(&publish_config(vec![PackageTarget::new("*.txt")]), work.path())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PmError::RemoteUnavailable {
                operation: "upload",
                ..
            }
        ));
    }
}
