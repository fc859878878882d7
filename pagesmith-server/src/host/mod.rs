//! Source-hosting provider seam.
//!
//! The rest of the crate talks to the provider only through [`SourceHost`],
//! which exposes exactly the calls a round needs. File content crosses this
//! boundary already base64-encoded; [`crate::sync`] owns that encoding.

pub mod github;
pub mod memory;

use async_trait::async_trait;

use crate::error::HostError;
use crate::model::FileVersion;

/// A repository the provider just created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRepository {
    pub name: String,
    pub owner: String,
    pub html_url: String,
}

/// A file as the provider returns it: base64 payload plus version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    pub path: String,
    /// Base64, possibly wrapped across lines.
    pub content: String,
    pub sha: String,
}

/// A create (no `sha`) or compare-and-swap update (with `sha`) of one file.
#[derive(Debug, Clone)]
pub struct PutFile<'a> {
    pub path: &'a str,
    pub message: &'a str,
    /// Base64 payload.
    pub content: &'a str,
    pub sha: Option<&'a str>,
}

#[async_trait]
pub trait SourceHost: Send + Sync {
    /// Create a public repository owned by the authenticated account.
    ///
    /// Fails with [`HostError::AlreadyExists`] when the name is taken.
    async fn create_repository(&self, name: &str) -> Result<CreatedRepository, HostError>;

    /// Read a file; `Ok(None)` when the path does not exist.
    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<EncodedFile>, HostError>;

    /// Create or update a file, recording one commit.
    ///
    /// Fails with [`HostError::Conflict`] when creating an existing path or
    /// when `sha` does not match the file's current version.
    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        file: PutFile<'_>,
    ) -> Result<FileVersion, HostError>;

    /// Turn on static hosting from `branch`/`path`, returning the site URL.
    ///
    /// Fails with [`HostError::AlreadyExists`] when hosting is already on.
    async fn enable_pages(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError>;
}
