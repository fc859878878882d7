//! Data carried through a round: the inbound task, remote file state,
//! repository identity and the result reported to the evaluator.

use serde::{Deserialize, Serialize};

/// Inbound task request, as posted by the evaluator.
///
/// Only built once the raw body's `secret` has been checked. `round` stays a
/// raw integer so an out-of-range value gets a readable 400.
#[derive(Clone, Deserialize, Serialize)]
pub struct TaskRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub secret: String,
    pub task: String,
    pub round: u32,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub brief: String,
    /// Acceptance criteria; opaque except for prompt rendering.
    #[serde(default)]
    pub checks: Vec<serde_json::Value>,
    #[serde(default)]
    pub evaluation_url: String,
}

impl std::fmt::Debug for TaskRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRequest")
            .field("email", &self.email)
            .field("secret", &"<redacted>")
            .field("task", &self.task)
            .field("round", &self.round)
            .field("nonce", &self.nonce)
            .field("brief", &self.brief)
            .field("checks", &self.checks)
            .field("evaluation_url", &self.evaluation_url)
            .finish()
    }
}

/// Which pass over the repository this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Round {
    /// Round 1: create the repository and publish.
    Create,
    /// Round 2: revise the published site in place.
    Revise,
}

impl Round {
    pub fn number(self) -> u32 {
        match self {
            Round::Create => 1,
            Round::Revise => 2,
        }
    }
}

impl TryFrom<u32> for Round {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Round::Create),
            2 => Ok(Round::Revise),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for Round {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// A task request that passed inbound validation.
#[derive(Debug, Clone)]
pub struct Task {
    pub email: String,
    pub name: String,
    pub round: Round,
    pub nonce: String,
    pub brief: String,
    pub checks: Vec<serde_json::Value>,
    pub evaluation_url: String,
}

/// A file as currently stored in the remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: String,
    /// Decoded UTF-8 content.
    pub content: String,
    /// Version token (blob SHA) to quote on the next update of this path.
    pub sha: String,
}

/// What a successful create/update returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVersion {
    /// New version token of the file itself.
    pub sha: String,
    /// Identifier of the commit that recorded the change.
    pub commit_sha: String,
}

/// Identity of the repository backing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    pub name: String,
    pub owner: String,
    pub web_url: String,
    pub hosting_url: String,
}

impl RepositoryDescriptor {
    /// Descriptor derived from owner and name alone, without asking the provider.
    pub fn derived(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            owner: owner.to_string(),
            web_url: repo_url(owner, name),
            hosting_url: pages_url(owner, name),
        }
    }
}

/// Payload delivered to the evaluation URL once a round completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

pub fn repo_url(owner: &str, name: &str) -> String {
    format!("https://github.com/{owner}/{name}")
}

pub fn pages_url(owner: &str, name: &str) -> String {
    format!("https://{owner}.github.io/{name}/")
}

/// Whether `name` is usable as a repository name.
pub fn is_valid_repo_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 100
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
