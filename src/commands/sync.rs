use anyhow::{Result, bail};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    application::{DependencyOutcome, SyncAction, SyncReport},
    archive::ZipCodec,
    cleanup,
    config::{RemoteConfig, SyncConfig},
    error::PmError,
    remote,
    runtime::Runtime,
};

use super::{describe, working_dir};

/// Install the best matching version of every package listed in
/// `config_path` into `dest` (the current directory by default).
///
/// Every package is attempted; the command fails afterwards if any of them
/// could not be installed.
#[tracing::instrument(skip(runtime, remote_config))]
pub async fn sync<R: Runtime + 'static>(
    runtime: R,
    config_path: &Path,
    dest: Option<PathBuf>,
    remote_config: RemoteConfig,
) -> Result<()> {
    let config = SyncConfig::load(&runtime, config_path)?;
    let dest = working_dir(&runtime, dest)?;
    let repository = remote::connect(&remote_config)?;

    info!(
        "Syncing {} package(s) from {} into {:?}",
        config.packages.len(),
        repository.location(),
        dest
    );

    let cleanup_ctx = cleanup::new_shared();
    let cleanup_ctx_clone = Arc::clone(&cleanup_ctx);
    let ctrl_c_handler = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cleaning up...");
            if let Ok(ctx) = cleanup_ctx_clone.lock() {
                ctx.cleanup();
            }
            std::process::exit(130); // Standard exit code for Ctrl-C
        }
    });

    let action = SyncAction::new(
        &runtime,
        &ZipCodec,
        repository.as_ref(),
        &remote_config,
        cleanup_ctx,
    );
    let report = action.sync_all(&config.packages, &dest).await;

    ctrl_c_handler.abort();

    print_report(&report);

    if report.has_failures() {
        bail!(
            "{} of {} package(s) not installed",
            report.results.len() - report.installed(),
            report.results.len()
        );
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    for result in &report.results {
        let dependency = &result.dependency;
        match &result.outcome {
            DependencyOutcome::Installed { version, .. } => {
                println!("Updated {} to {}", dependency.name, version);
            }
            DependencyOutcome::NoMatchingVersion => {
                println!(
                    "No matching version for {} {}",
                    dependency.name, dependency.requirement
                );
            }
            DependencyOutcome::Failed(e) => {
                eprintln!("{}", failure_message(&dependency.name, e));
            }
        }
    }
}

fn failure_message(name: &str, error: &PmError) -> String {
    format!("Failed to sync {} ({}): {}", name, error.kind(), describe(error))
}
