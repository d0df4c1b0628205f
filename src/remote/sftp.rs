//! Repository on an SSH server, reached through the SFTP subsystem.
//!
//! The endpoint is `sftp://[user[:password]@]host[:port][/base]`. Repository
//! paths are joined to `base`, so `/packages/foo-1.0.zip` on an endpoint
//! without a path is the absolute server path `/packages/foo-1.0.zip`.
//! Login uses password authentication; the session is opened on first use.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use russh::client;
use russh::keys::PublicKey;
use russh_sftp::client::SftpSession;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;

use super::{RemoteEntry, RemoteRepository};

pub const DEFAULT_SSH_PORT: u16 = 22;

/// Where an SFTP repository lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Server directory the repository paths are relative to, without a
    /// trailing `/`. Empty means the server root.
    pub base_path: String,
}

impl SftpTarget {
    /// Parse an `sftp://` endpoint. A user in the URL takes precedence over
    /// `default_user`.
    pub fn parse(endpoint: &str, default_user: Option<&str>) -> Result<Self> {
        let url = Url::parse(endpoint).with_context(|| format!("Invalid SFTP URL {}", endpoint))?;
        if url.scheme() != "sftp" {
            bail!("Invalid SFTP URL {}: scheme must be sftp", endpoint);
        }

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("Invalid SFTP URL {}: no host", endpoint))?
            .to_string();

        let user = match url.username() {
            "" => default_user
                .map(str::to_string)
                .ok_or_else(|| anyhow!("No SFTP user given. Put it in the URL or use --user."))?,
            user => user.to_string(),
        };

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_SSH_PORT),
            user,
            base_path: url.path().trim_end_matches('/').to_string(),
        })
    }

    /// Server path of a repository path.
    pub fn server_path(&self, path: &str) -> Result<String> {
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => bail!("Repository path {:?} leaves the repository root", path),
                s => segments.push(s),
            }
        }

        if segments.is_empty() && self.base_path.is_empty() {
            return Ok("/".to_string());
        }
        Ok(format!("{}/{}", self.base_path, segments.join("/"))
            .trim_end_matches('/')
            .to_string())
    }
}

/// Temporary sibling an upload is written to before it is renamed.
fn part_path(path: &str) -> String {
    match path.rsplit_once('/') {
        Some((dir, name)) => format!("{}/.{}.part", dir, name),
        None => format!(".{}.part", path),
    }
}

/// Listing entries in name order, without `.` and `..`.
fn listing_entries<I>(items: I) -> Vec<RemoteEntry>
where
    I: IntoIterator<Item = (String, bool)>,
{
    let mut entries: Vec<RemoteEntry> = items
        .into_iter()
        .filter(|(name, _)| name != "." && name != "..")
        .map(|(name, is_dir)| RemoteEntry { name, is_dir })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Host key policy: keys recorded in `~/.ssh/known_hosts` must match, hosts
/// not recorded there are accepted with a warning.
struct HostKeys {
    host: String,
    port: u16,
}

impl client::Handler for HostKeys {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        match russh::keys::check_known_hosts(&self.host, self.port, server_public_key) {
            Ok(true) => Ok(true),
            Ok(false) => {
                warn!("Host {} is not in known_hosts, accepting its key", self.host);
                Ok(true)
            }
            Err(russh::keys::Error::KeyChanged { line }) => {
                warn!(
                    "Host key of {} does not match known_hosts line {}",
                    self.host, line
                );
                Ok(false)
            }
            Err(e) => {
                warn!("Cannot check known_hosts for {}: {}", self.host, e);
                Ok(true)
            }
        }
    }
}

struct Connection {
    sftp: SftpSession,
    // the SSH session must outlive the SFTP channel
    _session: client::Handle<HostKeys>,
}

/// SFTP repository implementation.
pub struct SftpRepository {
    target: SftpTarget,
    password: String,
    connection: OnceCell<Connection>,
}

impl SftpRepository {
    pub fn new(target: SftpTarget, password: impl Into<String>) -> Self {
        Self {
            target,
            password: password.into(),
            connection: OnceCell::new(),
        }
    }

    async fn sftp(&self) -> Result<&SftpSession> {
        let connection = self.connection.get_or_try_init(|| self.open()).await?;
        Ok(&connection.sftp)
    }

    #[tracing::instrument(skip(self), fields(host = %self.target.host))]
    async fn open(&self) -> Result<Connection> {
        let target = &self.target;
        debug!("Connecting to {}:{} as {}...", target.host, target.port, target.user);

        let handler = HostKeys {
            host: target.host.clone(),
            port: target.port,
        };
        let config = Arc::new(client::Config::default());
        let mut session = client::connect(config, (target.host.as_str(), target.port), handler)
            .await
            .with_context(|| format!("Failed to connect to {}:{}", target.host, target.port))?;

        let auth = session
            .authenticate_password(target.user.as_str(), self.password.as_str())
            .await
            .context("SSH authentication failed")?;
        if !auth.success() {
            bail!("SSH login as {} was rejected", target.user);
        }

        let channel = session
            .channel_open_session()
            .await
            .context("Failed to open SSH channel")?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .context("Failed to start SFTP subsystem")?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .context("Failed to start SFTP session")?;

        Ok(Connection {
            sftp,
            _session: session,
        })
    }
}

#[async_trait]
impl RemoteRepository for SftpRepository {
    fn location(&self) -> String {
        let target = &self.target;
        format!(
            "sftp://{}@{}:{}{}",
            target.user, target.host, target.port, target.base_path
        )
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self.target.server_path(dir)?;
        debug!("Listing {}...", dir);

        let read_dir = self
            .sftp()
            .await?
            .read_dir(dir.as_str())
            .await
            .with_context(|| format!("Failed to list {}", dir))?;

        Ok(listing_entries(
            read_dir
                .into_iter()
                .map(|entry| (entry.file_name(), entry.file_type().is_dir())),
        ))
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.target.server_path(path)?;
        let part = part_path(&target);
        let sftp = self.sftp().await?;
        debug!("Uploading {} bytes to {}...", bytes.len(), part);

        let written = async {
            let mut file = sftp.create(part.as_str()).await?;
            file.write_all(&bytes).await?;
            file.shutdown().await?;
            anyhow::Ok(())
        }
        .await;
        if let Err(e) = written {
            let _ = sftp.remove_file(part.as_str()).await;
            return Err(e.context(format!("Failed to write {}", part)));
        }

        // SFTP rename does not replace an existing file
        if sftp.metadata(target.as_str()).await.is_ok() {
            sftp.remove_file(target.as_str())
                .await
                .with_context(|| format!("Failed to replace {}", target))?;
        }
        sftp.rename(part.as_str(), target.as_str())
            .await
            .with_context(|| format!("Failed to move {} into place", target))?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.target.server_path(path)?;
        debug!("Downloading {}...", target);

        self.sftp()
            .await?
            .read(target.as_str())
            .await
            .with_context(|| format!("Failed to download {}", target))
    }
}
