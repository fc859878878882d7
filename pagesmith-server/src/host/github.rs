//! GitHub REST implementation of [`SourceHost`].
//!
//! Endpoints used:
//!   POST /user/repos                          create repository
//!   GET  /repos/{owner}/{repo}/contents/{p}   read file + blob sha
//!   PUT  /repos/{owner}/{repo}/contents/{p}   create / update file
//!   POST /repos/{owner}/{repo}/pages          enable Pages

use async_trait::async_trait;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;

use super::{CreatedRepository, EncodedFile, PutFile, SourceHost};
use crate::error::HostError;
use crate::model::FileVersion;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Characters escaped inside one path segment of a contents URL.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    name: String,
    html_url: String,
    owner: OwnerResponse,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    path: String,
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: ShaOnly,
    commit: ShaOnly,
}

#[derive(Debug, Deserialize)]
struct ShaOnly {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PagesResponse {
    html_url: Option<String>,
}

impl GitHubClient {
    pub fn new(token: String, api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", "pagesmith")
    }

    fn contents_url(&self, owner: &str, repo: &str, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|seg| utf8_percent_encode(seg, SEGMENT).to_string())
            .collect();
        format!(
            "{}/repos/{owner}/{repo}/contents/{}",
            self.api_base,
            encoded.join("/")
        )
    }
}

/// Pull GitHub's `message` field out of an error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Map a non-success status to an error, given which statuses mean what for this call.
fn classify(status: StatusCode, body: &str, op: Operation) -> HostError {
    let message = error_message(body);
    match (op, status.as_u16()) {
        (_, 401) => HostError::Unauthorized,
        (_, 404) => HostError::NotFound,
        // the reason sits in errors[].message, not the top-level message
        (Operation::CreateRepo, 422) if body.contains("already exists") => HostError::AlreadyExists,
        (Operation::PutFile, 409) => HostError::Conflict,
        // "sha" wasn't supplied / does not match
        (Operation::PutFile, 422) if message.contains("sha") => HostError::Conflict,
        (Operation::EnablePages, 409) => HostError::AlreadyExists,
        (_, status) => HostError::Status { status, message },
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation {
    CreateRepo,
    GetFile,
    PutFile,
    EnablePages,
}

async fn fail(resp: reqwest::Response, op: Operation) -> HostError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    classify(status, &body, op)
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn create_repository(&self, name: &str) -> Result<CreatedRepository, HostError> {
        let url = format!("{}/user/repos", self.api_base);
        let resp = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({
                "name": name,
                "private": false,
                "description": format!("Generated site for task {name}"),
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(fail(resp, Operation::CreateRepo).await);
        }
        let repo: RepoResponse = resp
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))?;
        Ok(CreatedRepository {
            name: repo.name,
            owner: repo.owner.login,
            html_url: repo.html_url,
        })
    }

    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Option<EncodedFile>, HostError> {
        let url = self.contents_url(owner, repo, path);
        let resp = self.request(Method::GET, &url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(fail(resp, Operation::GetFile).await);
        }
        let file: ContentResponse = resp
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))?;
        if file.encoding != "base64" {
            return Err(HostError::Decode(format!(
                "{} has unsupported encoding {:?}",
                file.path, file.encoding
            )));
        }
        Ok(Some(EncodedFile {
            path: file.path,
            content: file.content,
            sha: file.sha,
        }))
    }

    async fn put_file(
        &self,
        owner: &str,
        repo: &str,
        file: PutFile<'_>,
    ) -> Result<FileVersion, HostError> {
        let url = self.contents_url(owner, repo, file.path);
        let mut body = serde_json::json!({
            "message": file.message,
            "content": file.content,
        });
        if let Some(sha) = file.sha {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }
        let resp = self.request(Method::PUT, &url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(fail(resp, Operation::PutFile).await);
        }
        let put: PutResponse = resp
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))?;
        Ok(FileVersion {
            sha: put.content.sha,
            commit_sha: put.commit.sha,
        })
    }

    async fn enable_pages(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError> {
        let url = format!("{}/repos/{owner}/{repo}/pages", self.api_base);
        let resp = self
            .request(Method::POST, &url)
            .json(&serde_json::json!({
                "source": { "branch": branch, "path": path },
            }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(fail(resp, Operation::EnablePages).await);
        }
        let pages: PagesResponse = resp
            .json()
            .await
            .map_err(|e| HostError::Decode(e.to_string()))?;
        Ok(pages
            .html_url
            .unwrap_or_else(|| crate::model::pages_url(owner, repo)))
    }
}
