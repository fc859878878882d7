use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagesmith_server::config::ServerConfig;
use pagesmith_server::host::SourceHost;
use pagesmith_server::host::github::GitHubClient;
use pagesmith_server::host::memory::MemoryHost;
use pagesmith_server::llm::LlmClient;
use pagesmith_server::notifier::DeferredNotifier;
use pagesmith_server::orchestrator::RoundOrchestrator;
use pagesmith_server::supervisor::Supervisor;
use pagesmith_server::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs in production (PAGESMITH_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("PAGESMITH_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("pagesmith_server=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::parse();
    tracing::debug!(?config, "Configuration loaded");

    let host: Arc<dyn SourceHost> = if config.dry_run {
        tracing::warn!("Dry run: publishing to an in-memory host, nothing reaches GitHub");
        Arc::new(MemoryHost::new(&config.github_owner))
    } else {
        let token = config
            .github_token
            .clone()
            .context("--github-token is required unless --dry-run is set")?;
        Arc::new(GitHubClient::new(token, &config.github_api))
    };
    let llm = LlmClient::new(config.api_key.clone())
        .with_model(&config.model)
        .with_api_base(&config.llm_api);
    let notifier = DeferredNotifier::new(config.notify_delay());

    let orchestrator = RoundOrchestrator::new(
        host,
        Arc::new(llm),
        Arc::new(notifier),
        config.publish_settings(),
    );
    let state = Arc::new(AppState::new(
        &config.shared_secret,
        Arc::new(orchestrator),
        Supervisor::new(),
    ));

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        owner = %config.github_owner,
        model = %config.model,
        "pagesmith listening"
    );
    axum::serve(listener, web::router(state)).await?;
    Ok(())
}
