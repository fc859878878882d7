//! Repository lifecycle: create the task's repository, turn on static hosting.

use std::sync::Arc;

use crate::error::HostError;
use crate::host::SourceHost;
use crate::model::RepositoryDescriptor;

/// What to do when round 1 finds the repository name already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExistingRepoPolicy {
    /// Treat the collision as fatal for the task.
    #[default]
    Fail,
    /// Reuse the existing repository as if it had just been created.
    Adopt,
}

/// Outcome of [`RepositoryManager::ensure_repository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ensured {
    Created(RepositoryDescriptor),
    Adopted(RepositoryDescriptor),
}

impl Ensured {
    pub fn descriptor(&self) -> &RepositoryDescriptor {
        match self {
            Ensured::Created(d) | Ensured::Adopted(d) => d,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnsureError {
    #[error("repository {0} already exists")]
    Exists(String),
    #[error(transparent)]
    Host(#[from] HostError),
}

pub struct RepositoryManager {
    host: Arc<dyn SourceHost>,
    owner: String,
    policy: ExistingRepoPolicy,
}

impl RepositoryManager {
    pub fn new(host: Arc<dyn SourceHost>, owner: &str, policy: ExistingRepoPolicy) -> Self {
        Self {
            host,
            owner: owner.to_string(),
            policy,
        }
    }

    /// Always attempts creation; a name collision is resolved by the configured policy.
    pub async fn ensure_repository(&self, name: &str) -> Result<Ensured, EnsureError> {
        match self.host.create_repository(name).await {
            Ok(created) => {
                let mut descriptor = RepositoryDescriptor::derived(&created.owner, &created.name);
                descriptor.web_url = created.html_url;
                tracing::info!(repo = %descriptor.name, url = %descriptor.web_url, "Repository created");
                Ok(Ensured::Created(descriptor))
            }
            Err(HostError::AlreadyExists) => match self.policy {
                ExistingRepoPolicy::Fail => Err(EnsureError::Exists(name.to_string())),
                ExistingRepoPolicy::Adopt => {
                    tracing::warn!(repo = name, "Repository already exists, adopting it");
                    Ok(Ensured::Adopted(RepositoryDescriptor::derived(&self.owner, name)))
                }
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Enable hosting; a repository that is already hosted is left as is.
    pub async fn enable_hosting(
        &self,
        name: &str,
        branch: &str,
        path: &str,
    ) -> Result<String, HostError> {
        match self.host.enable_pages(&self.owner, name, branch, path).await {
            Ok(url) => {
                tracing::info!(repo = name, %url, "Pages enabled");
                Ok(url)
            }
            Err(HostError::AlreadyExists) => {
                tracing::info!(repo = name, "Pages already enabled");
                Ok(crate::model::pages_url(&self.owner, name))
            }
            Err(e) => Err(e),
        }
    }
}
