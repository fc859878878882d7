//! Process configuration, resolved once at startup.
//!
//! Every flag has an environment fallback so the server can run from a
//! plain `.env` in deployment. Credentials end up in the objects built
//! from this config and are not read from the environment anywhere else.

use std::time::Duration;

use clap::Parser;

use crate::host::github;
use crate::llm;
use crate::orchestrator::PublishSettings;
use crate::repository::ExistingRepoPolicy;

#[derive(Parser, Clone)]
#[command(name = "pagesmith-server", about = "Generate, publish and report static sites for task webhooks")]
pub struct ServerConfig {
    /// Address to listen on (host:port)
    #[arg(long, env = "PAGESMITH_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Shared secret every task request must carry
    #[arg(long, env = "PAGESMITH_SECRET", hide_env_values = true)]
    pub shared_secret: String,

    /// GitHub token with repo and pages scope
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, required_unless_present = "dry_run")]
    pub github_token: Option<String>,

    /// Account that owns the generated repositories
    #[arg(long, env = "GITHUB_OWNER")]
    pub github_owner: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = github::DEFAULT_API_URL)]
    pub github_api: String,

    /// Branch Pages serves from
    #[arg(long, env = "PAGES_BRANCH", default_value = "main")]
    pub pages_branch: String,

    /// Directory within the branch Pages serves from
    #[arg(long, env = "PAGES_PATH", default_value = "/")]
    pub pages_path: String,

    /// Anthropic API key
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Claude model to use
    #[arg(long, env = "PAGESMITH_MODEL", default_value = llm::DEFAULT_MODEL)]
    pub model: String,

    /// Anthropic API base URL
    #[arg(long, env = "ANTHROPIC_API_URL", default_value = llm::DEFAULT_API_URL)]
    pub llm_api: String,

    /// Seconds to wait after a round before notifying the evaluator
    #[arg(long, env = "NOTIFY_DELAY_SECS", default_value_t = 15)]
    pub notify_delay_secs: u64,

    /// What round 1 does when the repository already exists
    #[arg(long, env = "EXISTING_REPO_POLICY", value_enum, default_value_t = ExistingRepoPolicy::Fail)]
    pub existing_repo: ExistingRepoPolicy,

    /// Copyright holder named in LICENSE (defaults to the owner)
    #[arg(long, env = "LICENSE_HOLDER")]
    pub license_holder: Option<String>,

    /// Publish to an in-memory host instead of GitHub
    #[arg(long, env = "PAGESMITH_DRY_RUN")]
    pub dry_run: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("listen_addr", &self.listen_addr)
            .field("github_owner", &self.github_owner)
            .field("github_api", &self.github_api)
            .field("pages_branch", &self.pages_branch)
            .field("pages_path", &self.pages_path)
            .field("model", &self.model)
            .field("llm_api", &self.llm_api)
            .field("notify_delay_secs", &self.notify_delay_secs)
            .field("existing_repo", &self.existing_repo)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl ServerConfig {
    pub fn notify_delay(&self) -> Duration {
        Duration::from_secs(self.notify_delay_secs)
    }

    pub fn publish_settings(&self) -> PublishSettings {
        PublishSettings {
            owner: self.github_owner.clone(),
            branch: self.pages_branch.clone(),
            pages_path: self.pages_path.clone(),
            license_holder: self
                .license_holder
                .clone()
                .unwrap_or_else(|| self.github_owner.clone()),
            existing_repo: self.existing_repo,
        }
    }
}
