//! Error types for provider calls, generation, rounds and notification.

/// Failure of a single call to the source-hosting provider.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("not found")]
    NotFound,
    /// Version token mismatch, missing token on update, or path already present on create.
    #[error("version conflict")]
    Conflict,
    /// Repository name taken, or hosting already enabled.
    #[error("already exists")]
    AlreadyExists,
    #[error("unauthorized")]
    Unauthorized,
    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// The generator could not produce a usable document.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generator returned no content")]
    Empty,
    #[error("generator output is not an HTML document (starts with {preview:?})")]
    NotADocument { preview: String },
    #[error("generation provider failed: {0}")]
    Provider(#[source] anyhow::Error),
}

/// Why a round stopped.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("{path} changed underneath us")]
    Conflict { path: String },
    #[error("{step} failed: {source}")]
    Provider {
        step: &'static str,
        #[source]
        source: HostError,
    },
    #[error("repository {name} already exists")]
    RepositoryExists { name: String },
    #[error("{path} is missing from the repository")]
    MissingArtifact { path: String },
}

impl RoundError {
    /// Classify a provider failure while touching `path` during `step`.
    pub fn from_host(step: &'static str, path: &str, err: HostError) -> Self {
        match err {
            HostError::Conflict => RoundError::Conflict {
                path: path.to_string(),
            },
            source => RoundError::Provider { step, source },
        }
    }
}

/// The completion callback could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("callback transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("callback rejected with status {status}")]
    Rejected { status: u16 },
}
