use anyhow::Result;
use log::info;
use std::path::Path;

use crate::{
    application::PublishAction,
    archive::ZipCodec,
    config::{PublishConfig, RemoteConfig},
    remote,
    runtime::Runtime,
};

/// Pack the files described by `config_path` and upload them as
/// `<name>-<version>.zip`. Targets and archive entries are relative to the
/// current directory.
#[tracing::instrument(skip(runtime, remote_config))]
pub async fn publish<R: Runtime + 'static>(
    runtime: R,
    config_path: &Path,
    remote_config: RemoteConfig,
) -> Result<()> {
    let config = PublishConfig::load(&runtime, config_path)?;
    let root = runtime.current_dir()?;
    let repository = remote::connect(&remote_config)?;

    info!(
        "Publishing {} {} to {}",
        config.name,
        config.version,
        repository.location()
    );

    let action = PublishAction::new(&runtime, &ZipCodec, repository.as_ref(), &remote_config);
    let result = action.publish(&config, &root).await?;

    println!(
        "Package {} uploaded to {}{}",
        result.archive,
        repository.location(),
        result.remote_path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PmError;
    use crate::test_utils::mock_runtime_in;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_publish_to_directory_repository() {
        let work = tempdir().unwrap();
        let repo = tempdir().unwrap();
        fs::create_dir_all(work.path().join("bin")).unwrap();
        fs::write(work.path().join("bin/tool"), "tool").unwrap();
        fs::write(
            work.path().join("packet.json"),
            r#"{"name": "tools", "ver": "1.2", "targets": ["bin/*"]}"#,
        )
        .unwrap();

        let runtime = mock_runtime_in(work.path().to_path_buf());
        let remote_config = RemoteConfig::new(repo.path().to_string_lossy());

        publish(
            runtime,
            &work.path().join("packet.json"),
            remote_config,
        )
        .await
        .unwrap();

        assert!(repo.path().join("packages/tools-1.2.zip").is_file());
    }

    #[tokio::test]
    async fn test_publish_invalid_config() {
        let work = tempdir().unwrap();
        let repo = tempdir().unwrap();
        fs::write(work.path().join("packet.yaml"), "name: tools\n").unwrap();

        let runtime = mock_runtime_in(work.path().to_path_buf());
        let remote_config = RemoteConfig::new(repo.path().to_string_lossy());

        let err = publish(
            runtime,
            &work.path().join("packet.yaml"),
            remote_config,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PmError>(),
            Some(PmError::ConfigInvalid { .. })
        ));
        assert!(fs::read_dir(repo.path()).unwrap().next().is_none());
    }
}
