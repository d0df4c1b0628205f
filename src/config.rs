//! Package configuration files and repository settings.
//!
//! Configuration files are YAML when their extension is `.yaml` or `.yml` and
//! JSON otherwise. Everything is validated and normalized while loading, so the
//! workflows only ever see [`PublishConfig`] and [`SyncConfig`].

use anyhow::Context;
use log::debug;
use serde::de::DeserializeOwned;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::error::{PmError, Result};
use crate::package::{Dependency, PackageTarget, Version, VersionRequirement, validate_package_name};
use crate::runtime::Runtime;

/// On-disk shapes (internal).
mod raw {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct Publish {
        pub name: String,
        pub ver: String,
        pub targets: Vec<Target>,
        #[serde(default)]
        pub packets: Vec<Dependency>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Sync {
        pub packages: Vec<Dependency>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Dependency {
        pub name: String,
        #[serde(default)]
        pub ver: String,
    }

    /// A target is either a bare pattern or a pattern with an exclusion.
    #[derive(Deserialize, Debug)]
    #[serde(untagged)]
    pub enum Target {
        Pattern(String),
        Detailed {
            path: String,
            #[serde(default)]
            exclude: Option<String>,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }

    fn parse<T: DeserializeOwned>(self, text: &str) -> Result<T> {
        match self {
            ConfigFormat::Json => serde_json::from_str(text)
                .map_err(|e| PmError::config_with_source("malformed JSON", e.into())),
            ConfigFormat::Yaml => serde_yaml::from_str(text)
                .map_err(|e| PmError::config_with_source("malformed YAML", e.into())),
        }
    }
}

/// What to publish: a package name and version plus the files that make it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub name: String,
    pub version: String,
    pub targets: Vec<PackageTarget>,
    /// Packages bundled with this one. Informational only.
    pub packets: Vec<Dependency>,
}

impl PublishConfig {
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let text = read_config(runtime, path)?;
        Self::parse(&text, ConfigFormat::from_path(path))
    }

    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self> {
        let raw: raw::Publish = format.parse(text)?;

        validate_package_name(&raw.name).map_err(PmError::config)?;
        let version = Version::parse(&raw.ver).map_err(|e| {
            PmError::config(format!("invalid version for package {}: {}", raw.name, e))
        })?;

        if raw.targets.is_empty() {
            return Err(PmError::config(format!(
                "package {} has no targets",
                raw.name
            )));
        }
        let targets = raw
            .targets
            .into_iter()
            .map(normalize_target)
            .collect::<Result<Vec<_>>>()?;

        let packets = raw
            .packets
            .into_iter()
            .map(into_dependency)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: raw.name,
            version: version.as_str().to_string(),
            targets,
            packets,
        })
    }
}

/// What to install: the requested dependencies, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub packages: Vec<Dependency>,
}

impl SyncConfig {
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> Result<Self> {
        let text = read_config(runtime, path)?;
        Self::parse(&text, ConfigFormat::from_path(path))
    }

    pub fn parse(text: &str, format: ConfigFormat) -> Result<Self> {
        let raw: raw::Sync = format.parse(text)?;
        let packages = raw
            .packages
            .into_iter()
            .map(into_dependency)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { packages })
    }
}

/// Where the repository lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// `http(s)://` URL or a directory path.
    pub endpoint: String,
    /// Directory inside the repository holding the archives.
    pub remote_dir: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Upper bound for each list, upload or download call.
    pub timeout: Duration,
}

impl RemoteConfig {
    pub const DEFAULT_REMOTE_DIR: &'static str = "/packages";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            remote_dir: Self::DEFAULT_REMOTE_DIR.to_string(),
            user: None,
            password: None,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn read_config<R: Runtime>(runtime: &R, path: &Path) -> Result<String> {
    debug!("Loading configuration from {:?}", path);

    let mut text = String::new();
    runtime
        .open(path)
        .and_then(|mut reader| {
            reader
                .read_to_string(&mut text)
                .context("Failed to read configuration")
        })
        .map_err(|e| {
            PmError::config_with_source(format!("cannot read {}", path.display()), e)
        })?;

    Ok(text)
}

fn normalize_target(target: raw::Target) -> Result<PackageTarget> {
    let (pattern, exclude) = match target {
        raw::Target::Pattern(pattern) => (pattern, None),
        raw::Target::Detailed { path, exclude } => (path, exclude),
    };

    if pattern.trim().is_empty() {
        return Err(PmError::config("target pattern is empty"));
    }

    let target = PackageTarget::new(pattern);
    Ok(match exclude.filter(|e| !e.is_empty()) {
        Some(exclude) => target.excluding(exclude),
        None => target,
    })
}

fn into_dependency(dep: raw::Dependency) -> Result<Dependency> {
    validate_package_name(&dep.name).map_err(PmError::config)?;
    let requirement = VersionRequirement::parse(&dep.ver).map_err(|e| {
        PmError::config(format!("invalid constraint for {}: {}", dep.name, e))
    })?;
    Ok(Dependency::new(dep.name, requirement))
}
