//! In-memory repository, mostly useful for tests and dry runs.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

use super::{RemoteEntry, RemoteRepository};

#[derive(Default)]
struct State {
    dirs: Vec<String>,
    files: Vec<(String, Vec<u8>)>,
}

/// Keeps files in insertion order; uploading an existing path replaces the
/// content in place.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

fn split(path: &str) -> (String, String) {
    let path = path.trim_matches('/');
    let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
    (normalize(parent), name.to_string())
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.put(path, bytes.into());
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        self.state().dirs.push(normalize(path));
        self
    }

    /// Paths of all stored files, in insertion order.
    pub fn paths(&self) -> Vec<String> {
        self.state().files.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let path = normalize(path);
        self.state()
            .files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, bytes)| bytes.clone())
    }

    fn put(&self, path: &str, bytes: Vec<u8>) {
        let path = normalize(path);
        let mut state = self.state();
        match state.files.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => *existing = bytes,
            None => state.files.push((path, bytes)),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RemoteRepository for MemoryRepository {
    fn location(&self) -> String {
        "memory".to_string()
    }

    async fn list(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let dir = normalize(dir);
        let state = self.state();

        let dirs = state.dirs.iter().filter_map(|d| {
            let (parent, name) = split(d);
            (parent == dir && !name.is_empty()).then(|| RemoteEntry::dir(name))
        });
        let files = state.files.iter().filter_map(|(p, _)| {
            let (parent, name) = split(p);
            (parent == dir).then(|| RemoteEntry::file(name))
        });

        Ok(dirs.chain(files).collect())
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.put(path, bytes);
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| anyhow!("No such file in repository: {}", normalize(path)))
    }
}
