//! Remote file synchronizer: single-file create/update guarded by version tokens.
//!
//! Callers hand over plain text; this module owns the Base64 transport
//! encoding in both directions. Nothing here caches a version token, every
//! update quotes the token the caller read for that exact path.

use std::sync::Arc;

use base64::Engine;

use crate::error::HostError;
use crate::host::{PutFile, SourceHost};
use crate::model::{FileVersion, RemoteFile};

pub struct FileSynchronizer {
    host: Arc<dyn SourceHost>,
    owner: String,
}

impl FileSynchronizer {
    pub fn new(host: Arc<dyn SourceHost>, owner: &str) -> Self {
        Self {
            host,
            owner: owner.to_string(),
        }
    }

    /// Create (`version` is `None`) or replace (`version` is the current token) one file.
    pub async fn put(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        version: Option<&str>,
    ) -> Result<FileVersion, HostError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        let written = self
            .host
            .put_file(
                &self.owner,
                repo,
                PutFile {
                    path,
                    message,
                    content: &encoded,
                    sha: version,
                },
            )
            .await?;
        tracing::debug!(repo, path, sha = %written.sha, commit = %written.commit_sha, "File written");
        Ok(written)
    }

    /// Read one file and its current version token; `None` if absent.
    pub async fn read(&self, repo: &str, path: &str) -> Result<Option<RemoteFile>, HostError> {
        let Some(file) = self.host.get_file(&self.owner, repo, path).await? else {
            return Ok(None);
        };
        let content = decode_content(&file.content)?;
        Ok(Some(RemoteFile {
            path: file.path,
            content,
            sha: file.sha,
        }))
    }
}

/// Decode provider Base64, which may be wrapped across lines.
fn decode_content(encoded: &str) -> Result<String, HostError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| HostError::Decode(format!("bad Base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|e| HostError::Decode(format!("content is not UTF-8: {e}")))
}
