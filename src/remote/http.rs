//! Repository served over HTTP.
//!
//! Listing reads a JSON directory index in the shape produced by nginx with
//! `autoindex_format json`. Uploads are plain `PUT` requests, as accepted by
//! WebDAV-enabled servers.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use reqwest::Url;

use crate::http::HttpClient;

use super::{RemoteEntry, RemoteRepository};

/// Directory index response types (internal).
mod api {
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct IndexEntry {
        pub name: String,
        #[serde(rename = "type")]
        pub kind: String,
    }
}

/// HTTP repository implementation.
pub struct HttpRepository {
    http_client: HttpClient,
    base_url: String,
}

impl HttpRepository {
    /// Create from an existing HttpClient.
    pub fn new(http_client: HttpClient, base_url: &str) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of a repository path. Each segment is percent-encoded, so names
    /// holding `#`, `?` or `%` reach the server intact.
    fn url_for(&self, path: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid repository URL {}", self.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Invalid repository URL {}", self.base_url))?;
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()));
            if path.ends_with('/') {
                segments.push("");
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl RemoteRepository for HttpRepository {
    fn location(&self) -> String {
        self.base_url.clone()
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let url = self.url_for(&format!("{}/", dir.trim_end_matches('/')))?;
        debug!("Listing {}...", url);

        let index: Vec<api::IndexEntry> = self
            .http_client
            .get_json(&url)
            .await
            .with_context(|| format!("Failed to list {}", url))?;

        Ok(index.into_iter().map(RemoteEntry::from).collect())
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        let url = self.url_for(path)?;
        self.http_client
            .put_bytes(&url, bytes)
            .await
            .with_context(|| format!("Failed to upload to {}", url))
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url_for(path)?;
        self.http_client
            .get_bytes(&url)
            .await
            .with_context(|| format!("Failed to download {}", url))
    }
}

impl From<api::IndexEntry> for RemoteEntry {
    fn from(e: api::IndexEntry) -> Self {
        RemoteEntry {
            is_dir: e.kind == "directory",
            name: e.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Client;

    fn repository(url: &str) -> HttpRepository {
        HttpRepository::new(HttpClient::new(Client::new()), url)
    }

    #[test]
    fn test_url_for() {
        let repo = repository("http://repo.local/");
        assert_eq!(
            repo.url_for("/packages/foo-1.0.zip").unwrap(),
            "http://repo.local/packages/foo-1.0.zip"
        );
        assert_eq!(repo.url_for("packages").unwrap(), "http://repo.local/packages");
        assert_eq!(repo.url_for("/packages/").unwrap(), "http://repo.local/packages/");
    }

    #[test]
    fn test_url_for_keeps_base_path() {
        let repo = repository("https://repo.local/mirror/");
        assert_eq!(
            repo.url_for("/packages/foo-1.0.zip").unwrap(),
            "https://repo.local/mirror/packages/foo-1.0.zip"
        );
    }

    #[test]
    fn test_url_for_encodes_reserved_characters() {
        let repo = repository("http://repo.local");
        assert_eq!(
            repo.url_for("/packages/c#-1.0.zip").unwrap(),
            "http://repo.local/packages/c%23-1.0.zip"
        );
        assert_eq!(
            repo.url_for("/packages/what?-1.0.zip").unwrap(),
            "http://repo.local/packages/what%3F-1.0.zip"
        );
        assert_eq!(
            repo.url_for("/packages/100%-1.0.zip").unwrap(),
            "http://repo.local/packages/100%25-1.0.zip"
        );
    }

    #[tokio::test]
    async fn test_download_name_with_hash() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/packages/c%23-1.0.zip")
            .with_status(200)
            .with_body("zip")
            .create_async()
            .await;

        let bytes = repository(&server.url())
            .download("/packages/c#-1.0.zip")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"zip");
    }

    #[tokio::test]
    async fn test_list_parses_autoindex_json() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/packages/")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"name": "old", "type": "directory", "mtime": "Mon, 01 Jan 2024 00:00:00 GMT"},
                    {"name": "foo-1.0.zip", "type": "file", "mtime": "Mon, 01 Jan 2024 00:00:00 GMT", "size": 120},
                    {"name": "foo-1.10.zip", "type": "file", "mtime": "Mon, 01 Jan 2024 00:00:00 GMT", "size": 130}
                ]"#,
            )
            .create_async()
            .await;

        let entries = repository(&server.url()).list("/packages").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            entries,
            vec![
                RemoteEntry::dir("old"),
                RemoteEntry::file("foo-1.0.zip"),
                RemoteEntry::file("foo-1.10.zip"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_an_error() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/nowhere/")
            .with_status(404)
            .create_async()
            .await;

        let result = repository(&server.url()).list("/nowhere").await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_upload_puts_bytes() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("PUT", "/packages/foo-1.0.zip")
            .match_body(mockito::Matcher::Exact("zip".to_string()))
            .with_status(201)
            .create_async()
            .await;

        repository(&server.url())
            .upload("/packages/foo-1.0.zip", b"zip".to_vec())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_gets_bytes() {
        let mut server = mockito::Server::new_async().await;

        let mock = server
            .mock("GET", "/packages/foo-1.0.zip")
            .with_status(200)
            .with_body("zip")
            .create_async()
            .await;

        let bytes = repository(&server.url())
            .download("/packages/foo-1.0.zip")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"zip");
    }
}
