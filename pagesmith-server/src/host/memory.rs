//! In-memory [`SourceHost`] with the provider's version-token semantics.
//!
//! Backs `--dry-run` and the test suites. Every call is recorded so callers
//! can assert on exactly which remote operations happened.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use base64::Engine;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use super::{CreatedRepository, EncodedFile, PutFile, SourceHost};
use crate::error::HostError;
use crate::model::{FileVersion, pages_url, repo_url};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CreateRepository(String),
    GetFile { repo: String, path: String },
    PutFile { repo: String, path: String, sha: Option<String> },
    EnablePages(String),
}

#[derive(Debug, Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    sha: String,
}

#[derive(Debug, Default)]
struct StoredRepo {
    files: HashMap<String, StoredFile>,
    pages: bool,
    commits: u64,
}

#[derive(Default)]
struct Inner {
    repos: HashMap<String, StoredRepo>,
    calls: Vec<HostCall>,
    failing_paths: HashSet<String>,
}

pub struct MemoryHost {
    owner: String,
    inner: Mutex<Inner>,
}

fn blob_sha(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().take(20).map(|b| format!("{b:02x}")).collect()
}

/// Base64 wrapped at 60 columns, as GitHub serves file content.
fn wrapped_base64(bytes: &[u8]) -> String {
    let flat = base64::engine::general_purpose::STANDARD.encode(bytes);
    flat.as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

impl MemoryHost {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.inner.lock().calls.clone()
    }

    /// Make every subsequent `put_file` on `path` fail with a provider error.
    pub fn fail_puts_to(&self, path: &str) {
        self.inner.lock().failing_paths.insert(path.to_string());
    }

    /// Current plain-text content of a file, bypassing the call log.
    pub fn file_text(&self, repo: &str, path: &str) -> Option<String> {
        let inner = self.inner.lock();
        let file = inner.repos.get(repo)?.files.get(path)?;
        Some(String::from_utf8_lossy(&file.bytes).into_owned())
    }

    pub fn pages_enabled(&self, repo: &str) -> bool {
        self.inner
            .lock()
            .repos
            .get(repo)
            .is_some_and(|r| r.pages)
    }

    /// Delete a file out of band. Returns whether it existed.
    pub fn remove(&self, repo: &str, path: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(stored) = inner.repos.get_mut(repo) else {
            return false;
        };
        stored.commits += 1;
        stored.files.remove(path).is_some()
    }

    /// Overwrite a file out of band, as another writer would. Returns the new sha.
    pub fn overwrite(&self, repo: &str, path: &str, text: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let stored = inner.repos.get_mut(repo)?;
        stored.commits += 1;
        let sha = blob_sha(text.as_bytes());
        stored.files.insert(
            path.to_string(),
            StoredFile {
                bytes: text.as_bytes().to_vec(),
                sha: sha.clone(),
            },
        );
        Some(sha)
    }
}

#[async_trait]
impl SourceHost for MemoryHost {
    async fn create_repository(&self, name: &str) -> Result<CreatedRepository, HostError> {
        let mut inner = self.inner.lock();
        inner.calls.push(HostCall::CreateRepository(name.to_string()));
        if inner.repos.contains_key(name) {
            return Err(HostError::AlreadyExists);
        }
        inner.repos.insert(name.to_string(), StoredRepo::default());
        Ok(CreatedRepository {
            name: name.to_string(),
            owner: self.owner.clone(),
            html_url: repo_url(&self.owner, name),
        })
    }

    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<EncodedFile>, HostError> {
        let mut inner = self.inner.lock();
        inner.calls.push(HostCall::GetFile {
            repo: repo.to_string(),
            path: path.to_string(),
        });
        // GitHub answers 404 for a missing repository and a missing path alike
        if owner != self.owner {
            return Ok(None);
        }
        let file = inner.repos.get(repo).and_then(|r| r.files.get(path));
        Ok(file.map(|f| EncodedFile {
            path: path.to_string(),
            content: wrapped_base64(&f.bytes),
            sha: f.sha.clone(),
        }))
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        file: PutFile<'_>,
    ) -> Result<FileVersion, HostError> {
        let mut inner = self.inner.lock();
        inner.calls.push(HostCall::PutFile {
            repo: repo.to_string(),
            path: file.path.to_string(),
            sha: file.sha.map(str::to_string),
        });
        if inner.failing_paths.contains(file.path) {
            return Err(HostError::Status {
                status: 500,
                message: format!("injected failure for {}", file.path),
            });
        }
        if owner != self.owner {
            return Err(HostError::NotFound);
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(file.content)
            .map_err(|e| HostError::Status {
                status: 422,
                message: format!("content is not valid Base64: {e}"),
            })?;
        let stored = inner.repos.get_mut(repo).ok_or(HostError::NotFound)?;
        match (stored.files.get(file.path), file.sha) {
            (Some(_), None) => return Err(HostError::Conflict),
            (Some(current), Some(sha)) if current.sha != sha => return Err(HostError::Conflict),
            (None, Some(_)) => return Err(HostError::Conflict),
            _ => {}
        }
        stored.commits += 1;
        let sha = blob_sha(&bytes);
        let mut commit = Sha256::new();
        commit.update(repo.as_bytes());
        commit.update(file.path.as_bytes());
        commit.update(file.message.as_bytes());
        commit.update(stored.commits.to_be_bytes());
        let commit_sha = blob_sha(&commit.finalize());
        stored.files.insert(
            file.path.to_string(),
            StoredFile {
                bytes,
                sha: sha.clone(),
            },
        );
        Ok(FileVersion { sha, commit_sha })
    }

    async fn enable_pages(
        &self,
        owner: &str,
        repo: &str,
        _branch: &str,
        _path: &str,
    ) -> Result<String, HostError> {
        let mut inner = self.inner.lock();
        inner.calls.push(HostCall::EnablePages(repo.to_string()));
        let stored = inner.repos.get_mut(repo).ok_or(HostError::NotFound)?;
        if stored.pages {
            return Err(HostError::AlreadyExists);
        }
        stored.pages = true;
        Ok(pages_url(owner, repo))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    async fn put_index(
        host: &MemoryHost,
        content: String,
        sha: Option<String>,
    ) -> Result<FileVersion, HostError> {
        host.put_file(
            "octo",
            "demo",
            PutFile {
                path: "index.html",
                message: "m",
                content: &content,
                sha: sha.as_deref(),
            },
        )
        .await
    }

    #[tokio::test]
    async fn create_twice_collides() {
        let host = MemoryHost::new("octo");
        host.create_repository("demo").await.unwrap();
        assert!(matches!(
            host.create_repository("demo").await,
            Err(HostError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn update_requires_current_sha() {
        let host = MemoryHost::new("octo");
        host.create_repository("demo").await.unwrap();
        let v1 = put_index(&host, b64("one"), None).await.unwrap();
        assert!(matches!(put_index(&host, b64("again"), None).await, Err(HostError::Conflict)));
        assert!(matches!(
            put_index(&host, b64("two"), Some("0000".into())).await,
            Err(HostError::Conflict)
        ));
        let v2 = put_index(&host, b64("two"), Some(v1.sha.clone())).await.unwrap();
        assert_ne!(v1.sha, v2.sha);
        assert_ne!(v1.commit_sha, v2.commit_sha);
        assert!(matches!(
            put_index(&host, b64("three"), Some(v1.sha)).await,
            Err(HostError::Conflict)
        ));
        assert_eq!(host.file_text("demo", "index.html").as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn get_returns_wrapped_base64() {
        let host = MemoryHost::new("octo");
        host.create_repository("demo").await.unwrap();
        let long = "x".repeat(200);
        host.overwrite("demo", "index.html", &long).unwrap();
        let file = host.get_file("octo", "demo", "index.html").await.unwrap().unwrap();
        assert!(file.content.contains('\n'));
        assert!(host.get_file("octo", "demo", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_repository_reads_as_absent_file() {
        let host = MemoryHost::new("octo");
        assert!(host.get_file("octo", "ghost", "index.html").await.unwrap().is_none());
        assert!(host.get_file("someone", "demo", "index.html").await.unwrap().is_none());
        assert!(matches!(
            put_index(&host, b64("x"), None).await,
            Err(HostError::NotFound)
        ));
    }

    #[tokio::test]
    async fn pages_second_enable_reports_existing() {
        let host = MemoryHost::new("octo");
        host.create_repository("demo").await.unwrap();
        host.enable_pages("octo", "demo", "main", "/").await.unwrap();
        assert!(matches!(
            host.enable_pages("octo", "demo", "main", "/").await,
            Err(HostError::AlreadyExists)
        ));
        assert!(host.pages_enabled("demo"));
    }
}
