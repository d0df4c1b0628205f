//! Remote repository abstraction.
//!
//! A repository is a flat directory of `<name>-<version>.zip` archives. The
//! workflows only need to list a directory, upload a file and download a
//! file; how the bytes travel is up to the implementation.

mod http;
mod local;
mod memory;
mod sftp;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Url};
use std::fmt;

use crate::config::RemoteConfig;
use crate::http::HttpClient;

pub use http::HttpRepository;
pub use local::LocalRepository;
pub use memory::MemoryRepository;
pub use sftp::{SftpRepository, SftpTarget};

/// One entry of a remote directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_dir: bool,
}

impl RemoteEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

impl fmt::Display for RemoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dir {
            write!(f, "{}/", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Operations the publish and sync workflows need from a repository.
///
/// Paths are `/`-separated and relative to the repository root. A failure is
/// always an `Err`; an empty directory lists as `Ok(vec![])`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Human readable location, used in messages.
    fn location(&self) -> String;

    /// List the entries of `dir` in repository order.
    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>>;

    /// Store `bytes` at `path`, replacing any existing file.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    /// Fetch the file at `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
}

/// Join a remote directory and a file name.
pub fn remote_path(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Open the repository described by `config`.
///
/// `sftp://` endpoints use [`SftpRepository`], `http://` and `https://`
/// endpoints use [`HttpRepository`]; anything else is treated as a local or
/// mounted directory. No connection is made until the first call.
pub fn connect(config: &RemoteConfig) -> Result<Box<dyn RemoteRepository>> {
    let endpoint = config.endpoint.as_str();

    if endpoint.starts_with("sftp://") {
        let target = SftpTarget::parse(endpoint, config.user.as_deref())?;
        let password = Url::parse(endpoint)
            .ok()
            .and_then(|url| url.password().map(str::to_string))
            .or_else(|| config.password.clone())
            .ok_or_else(|| anyhow!("No SFTP password given. Use --password or set PM_PASSWORD."))?;

        debug!("Using SFTP repository on {} as {}", target.host, target.user);
        Ok(Box::new(SftpRepository::new(target, password)))
    } else if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        debug!("Using HTTP repository at {}", endpoint);

        let client = Client::builder()
            .user_agent(concat!("pm/", env!("PM_VERSION")))
            .connect_timeout(config.timeout)
            .build()?;

        let mut http_client = HttpClient::new(client);
        if let Some(user) = &config.user {
            debug!("Using basic authentication as {}", user);
            http_client = http_client.with_basic_auth(user.clone(), config.password.clone());
        }

        Ok(Box::new(HttpRepository::new(http_client, endpoint)))
    } else {
        debug!("Using directory repository at {}", endpoint);
        Ok(Box::new(LocalRepository::new(endpoint)))
    }
}
