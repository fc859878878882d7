//! Round orchestrator.
//!
//! Drives one round through `Start → Generating → Publishing →
//! HostingConfigured → Completed`, or into `Failed` from any of them.
//! Round 1 creates the repository and publishes; round 2 revises the
//! homepage in place and skips hosting configuration. All remote calls in
//! a round are sequential, each depending on the previous one's output.
//!
//! Only the homepage is load-bearing: README and LICENSE failures are
//! logged and skipped. A round either yields exactly one [`RoundResult`]
//! and one scheduled notification, or nothing.

use std::sync::Arc;

use chrono::Datelike;

use crate::documents::{self, HOMEPAGE_PATH, LICENSE_PATH, README_PATH};
use crate::error::RoundError;
use crate::generator::{ContentGenerator, TextGenerator};
use crate::host::SourceHost;
use crate::model::{FileVersion, RepositoryDescriptor, Round, RoundResult, Task};
use crate::notifier::Notify;
use crate::repository::{EnsureError, Ensured, ExistingRepoPolicy, RepositoryManager};
use crate::sync::FileSynchronizer;

/// Where and how the site is published.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub owner: String,
    pub branch: String,
    pub pages_path: String,
    pub license_holder: String,
    pub existing_repo: ExistingRepoPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Start,
    Generating,
    Publishing,
    HostingConfigured,
    Completed,
    Failed,
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoundState::Start => write!(f, "start"),
            RoundState::Generating => write!(f, "generating"),
            RoundState::Publishing => write!(f, "publishing"),
            RoundState::HostingConfigured => write!(f, "hosting-configured"),
            RoundState::Completed => write!(f, "completed"),
            RoundState::Failed => write!(f, "failed"),
        }
    }
}

/// A round that ended in `Failed`, with the state it was in when it broke.
#[derive(Debug, thiserror::Error)]
#[error("round failed while {state}: {error}")]
pub struct RoundFailure {
    pub state: RoundState,
    #[source]
    pub error: RoundError,
}

/// Tracks the current state of one round and logs each transition.
struct Progress<'a> {
    task: &'a Task,
    state: RoundState,
}

impl<'a> Progress<'a> {
    fn new(task: &'a Task) -> Self {
        Self {
            task,
            state: RoundState::Start,
        }
    }

    fn advance(&mut self, next: RoundState) {
        tracing::info!(
            task = %self.task.name,
            round = %self.task.round,
            from = %self.state,
            to = %next,
            "Round state"
        );
        self.state = next;
    }

    fn fail(&self, error: RoundError) -> RoundFailure {
        RoundFailure {
            state: self.state,
            error,
        }
    }
}

pub struct RoundOrchestrator {
    generator: ContentGenerator,
    files: FileSynchronizer,
    repos: RepositoryManager,
    notifier: Arc<dyn Notify>,
    settings: PublishSettings,
}

impl RoundOrchestrator {
    pub fn new(
        host: Arc<dyn SourceHost>,
        text: Arc<dyn TextGenerator>,
        notifier: Arc<dyn Notify>,
        settings: PublishSettings,
    ) -> Self {
        Self {
            generator: ContentGenerator::new(text),
            files: FileSynchronizer::new(host.clone(), &settings.owner),
            repos: RepositoryManager::new(host, &settings.owner, settings.existing_repo),
            notifier,
            settings,
        }
    }

    /// Run a round and, if it completes, schedule its notification.
    pub async fn execute(&self, task: &Task) -> Result<RoundResult, RoundFailure> {
        match self.run(task).await {
            Ok(result) => {
                self.notifier.schedule(&task.evaluation_url, result.clone());
                Ok(result)
            }
            Err(failure) => {
                tracing::error!(
                    task = %task.name,
                    round = %task.round,
                    state = %failure.state,
                    error = %failure.error,
                    "Round failed, no notification will be sent"
                );
                Err(failure)
            }
        }
    }

    /// Run a round without notifying.
    pub async fn run(&self, task: &Task) -> Result<RoundResult, RoundFailure> {
        let mut progress = Progress::new(task);
        let outcome = match task.round {
            Round::Create => self.create(task, &mut progress).await,
            Round::Revise => self.revise(task, &mut progress).await,
        };
        match outcome {
            Ok(result) => {
                progress.advance(RoundState::Completed);
                Ok(result)
            }
            Err(error) => {
                let failure = progress.fail(error);
                progress.advance(RoundState::Failed);
                Err(failure)
            }
        }
    }

    async fn create(&self, task: &Task, progress: &mut Progress<'_>) -> Result<RoundResult, RoundError> {
        progress.advance(RoundState::Generating);
        let html = self
            .generator
            .generate(&task.brief, &task.checks, None)
            .await?;

        progress.advance(RoundState::Publishing);
        let ensured = self
            .repos
            .ensure_repository(&task.name)
            .await
            .map_err(|e| match e {
                EnsureError::Exists(name) => RoundError::RepositoryExists { name },
                EnsureError::Host(source) => RoundError::Provider {
                    step: "create repository",
                    source,
                },
            })?;
        let adopted = matches!(ensured, Ensured::Adopted(_));
        let repo = ensured.descriptor().clone();

        let homepage = self
            .write(
                &repo.name,
                HOMEPAGE_PATH,
                "feat: Initial commit with index.html",
                &html,
                adopted,
            )
            .await
            .map_err(|(step, e)| RoundError::from_host(step, HOMEPAGE_PATH, e))?;

        let readme = documents::readme(&task.name, &task.brief, &repo.hosting_url);
        self.write_auxiliary(task, &repo.name, README_PATH, "docs: Add README", &readme, adopted)
            .await;
        let year = chrono::Utc::now().year();
        let license = documents::mit_license(year, &self.settings.license_holder);
        self.write_auxiliary(task, &repo.name, LICENSE_PATH, "feat: Add MIT License", &license, adopted)
            .await;

        self.repos
            .enable_hosting(&repo.name, &self.settings.branch, &self.settings.pages_path)
            .await
            .map_err(|source| RoundError::Provider {
                step: "enable hosting",
                source,
            })?;
        progress.advance(RoundState::HostingConfigured);

        Ok(self.result(task, &repo, homepage))
    }

    async fn revise(&self, task: &Task, progress: &mut Progress<'_>) -> Result<RoundResult, RoundError> {
        progress.advance(RoundState::Generating);
        let current = self
            .files
            .read(&task.name, HOMEPAGE_PATH)
            .await
            .map_err(|e| RoundError::from_host("read homepage", HOMEPAGE_PATH, e))?
            .ok_or_else(|| RoundError::MissingArtifact {
                path: HOMEPAGE_PATH.to_string(),
            })?;
        let html = self
            .generator
            .generate(&task.brief, &task.checks, Some(&current.content))
            .await?;

        progress.advance(RoundState::Publishing);
        let message = format!("feat: Round {} revision of index.html", task.round);
        let homepage = self
            .files
            .put(&task.name, HOMEPAGE_PATH, &message, &html, Some(&current.sha))
            .await
            .map_err(|e| RoundError::from_host("update homepage", HOMEPAGE_PATH, e))?;

        if let Err(e) = self.append_readme(task).await {
            tracing::warn!(
                task = %task.name,
                round = %task.round,
                path = README_PATH,
                error = %e,
                "README update failed, continuing"
            );
        }

        let repo = RepositoryDescriptor::derived(&self.settings.owner, &task.name);
        Ok(self.result(task, &repo, homepage))
    }

    /// Create `path`, or when the repository was adopted, update it against a fresh read.
    async fn write(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        adopted: bool,
    ) -> Result<FileVersion, (&'static str, crate::error::HostError)> {
        let current = if adopted {
            self.files
                .read(repo, path)
                .await
                .map_err(|e| ("read existing file", e))?
        } else {
            None
        };
        self.files
            .put(repo, path, message, content, current.as_ref().map(|f| f.sha.as_str()))
            .await
            .map_err(|e| ("publish file", e))
    }

    async fn write_auxiliary(
        &self,
        task: &Task,
        repo: &str,
        path: &str,
        message: &str,
        content: &str,
        adopted: bool,
    ) {
        if let Err((step, e)) = self.write(repo, path, message, content, adopted).await {
            tracing::warn!(
                task = %task.name,
                round = %task.round,
                path,
                step,
                error = %e,
                "Auxiliary file not written, continuing"
            );
        }
    }

    async fn append_readme(&self, task: &Task) -> Result<FileVersion, crate::error::HostError> {
        let message = format!("docs: Document round {} changes", task.round);
        match self.files.read(&task.name, README_PATH).await? {
            Some(readme) => {
                let text = documents::append_revision(&readme.content, task.round, &task.brief);
                self.files
                    .put(&task.name, README_PATH, &message, &text, Some(&readme.sha))
                    .await
            }
            None => {
                let repo = RepositoryDescriptor::derived(&self.settings.owner, &task.name);
                let text = documents::append_revision(
                    &documents::readme(&task.name, "", &repo.hosting_url),
                    task.round,
                    &task.brief,
                );
                self.files
                    .put(&task.name, README_PATH, &message, &text, None)
                    .await
            }
        }
    }

    fn result(&self, task: &Task, repo: &RepositoryDescriptor, homepage: FileVersion) -> RoundResult {
        RoundResult {
            email: task.email.clone(),
            task: task.name.clone(),
            round: task.round.number(),
            nonce: task.nonce.clone(),
            repo_url: repo.web_url.clone(),
            commit_sha: homepage.commit_sha,
            pages_url: repo.hosting_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::error::GenerationError;
    use crate::host::memory::{HostCall, MemoryHost};

    type Hook = Box<dyn Fn() + Send + Sync>;

    /// Replies with queued documents; optionally runs a hook mid-generation.
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
        hook: Mutex<Option<Hook>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
                hook: Mutex::new(None),
            })
        }

        fn during_generation(&self, hook: impl Fn() + Send + Sync + 'static) {
            *self.hook.lock() = Some(Box::new(hook));
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate_text(&self, _system: &str, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().push(prompt.to_string());
            if let Some(hook) = self.hook.lock().as_ref() {
                hook();
            }
            self.replies
                .lock()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, RoundResult)>>,
    }

    impl Notify for Recorder {
        fn schedule(&self, target: &str, result: RoundResult) {
            self.sent.lock().push((target.to_string(), result));
        }
    }

    struct Harness {
        host: Arc<MemoryHost>,
        text: Arc<Scripted>,
        notes: Arc<Recorder>,
        orchestrator: RoundOrchestrator,
    }

    fn harness(replies: &[&str], policy: ExistingRepoPolicy) -> Harness {
        let host = Arc::new(MemoryHost::new("octo"));
        let text = Scripted::new(replies);
        let notes = Arc::new(Recorder::default());
        let orchestrator = RoundOrchestrator::new(
            host.clone(),
            text.clone(),
            notes.clone(),
            PublishSettings {
                owner: "octo".into(),
                branch: "main".into(),
                pages_path: "/".into(),
                license_holder: "Octo Cat".into(),
                existing_repo: policy,
            },
        );
        Harness {
            host,
            text,
            notes,
            orchestrator,
        }
    }

    fn task(round: Round, brief: &str) -> Task {
        Task {
            email: "student@example.com".into(),
            name: "demo-1".into(),
            round,
            nonce: "nonce-1".into(),
            brief: brief.into(),
            checks: vec![],
            evaluation_url: "http://evaluator.test/notify".into(),
        }
    }

    const PAGE_V1: &str = "<!DOCTYPE html><html><body>calculator</body></html>";
    const PAGE_V2: &str = "<!DOCTYPE html><html><body>calculator, dark</body></html>";

    fn puts_to(calls: &[HostCall], wanted: &str) -> Vec<Option<String>> {
        calls
            .iter()
            .filter_map(|c| match c {
                HostCall::PutFile { path, sha, .. } if path == wanted => Some(sha.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn round_one_creates_publishes_and_notifies_once() {
        let h = harness(&[PAGE_V1], ExistingRepoPolicy::Fail);
        let result = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();

        assert_eq!(result.repo_url, "https://github.com/octo/demo-1");
        assert_eq!(result.pages_url, "https://octo.github.io/demo-1/");
        assert_eq!(result.round, 1);
        assert_eq!(result.nonce, "nonce-1");
        assert!(!result.commit_sha.is_empty());

        let calls = h.host.calls();
        assert_eq!(
            calls,
            vec![
                HostCall::CreateRepository("demo-1".into()),
                HostCall::PutFile { repo: "demo-1".into(), path: "index.html".into(), sha: None },
                HostCall::PutFile { repo: "demo-1".into(), path: "README.md".into(), sha: None },
                HostCall::PutFile { repo: "demo-1".into(), path: "LICENSE".into(), sha: None },
                HostCall::EnablePages("demo-1".into()),
            ]
        );
        assert_eq!(h.host.file_text("demo-1", "index.html").unwrap().trim(), PAGE_V1);
        assert!(h.host.file_text("demo-1", "README.md").unwrap().contains("a calculator page"));
        assert!(h.host.file_text("demo-1", "LICENSE").unwrap().contains("Octo Cat"));
        assert!(h.host.pages_enabled("demo-1"));

        let sent = h.notes.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "http://evaluator.test/notify");
        assert_eq!(sent[0].1, result);
    }

    #[tokio::test]
    async fn invalid_generation_never_touches_the_repository() {
        let h = harness(
            &["Here is your page: <!DOCTYPE html>", "```html\n<!DOCTYPE html>```"],
            ExistingRepoPolicy::Fail,
        );
        for _ in 0..2 {
            let failure = h
                .orchestrator
                .execute(&task(Round::Create, "a calculator page"))
                .await
                .unwrap_err();
            assert_eq!(failure.state, RoundState::Generating);
            assert!(matches!(
                failure.error,
                RoundError::Generation(GenerationError::NotADocument { .. })
            ));
        }
        assert!(h.host.calls().is_empty());
        assert!(h.notes.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn auxiliary_failures_do_not_block_the_round() {
        let h = harness(&[PAGE_V1], ExistingRepoPolicy::Fail);
        h.host.fail_puts_to("README.md");
        h.host.fail_puts_to("LICENSE");

        let result = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();
        assert!(!result.commit_sha.is_empty());
        assert!(h.host.pages_enabled("demo-1"));
        assert!(h.host.file_text("demo-1", "README.md").is_none());
        assert_eq!(h.notes.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn homepage_failure_is_fatal() {
        let h = harness(&[PAGE_V1], ExistingRepoPolicy::Fail);
        h.host.fail_puts_to("index.html");

        let failure = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap_err();
        assert_eq!(failure.state, RoundState::Publishing);
        assert!(matches!(failure.error, RoundError::Provider { .. }));
        assert!(!h.host.pages_enabled("demo-1"));
        assert!(puts_to(&h.host.calls(), "README.md").is_empty());
        assert!(h.notes.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn round_one_collision_fails_under_default_policy() {
        let h = harness(&[PAGE_V1], ExistingRepoPolicy::Fail);
        h.host.create_repository("demo-1").await.unwrap();

        let failure = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap_err();
        assert!(matches!(failure.error, RoundError::RepositoryExists { ref name } if name == "demo-1"));
        assert!(puts_to(&h.host.calls(), "index.html").is_empty());
        assert!(h.notes.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn round_one_collision_adopts_when_configured() {
        let h = harness(&[PAGE_V1, PAGE_V1], ExistingRepoPolicy::Adopt);
        h.orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();

        // retried round 1 on the same task
        let retry = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();
        assert_eq!(retry.repo_url, "https://github.com/octo/demo-1");
        let index_puts = puts_to(&h.host.calls(), "index.html");
        assert_eq!(index_puts.len(), 2);
        assert!(index_puts[0].is_none());
        assert!(index_puts[1].is_some(), "adopted homepage must be updated with its current sha");
        assert_eq!(h.notes.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn round_two_revises_with_fresh_token() {
        let h = harness(&[PAGE_V1, PAGE_V2], ExistingRepoPolicy::Fail);
        let first = h
            .orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();
        // changed by someone else between rounds
        let outside_sha = h
            .host
            .overwrite("demo-1", "index.html", "<!DOCTYPE html><p>hand edit</p>")
            .unwrap();
        let before = h.host.calls().len();

        let second = h
            .orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap();

        assert_ne!(second.commit_sha, first.commit_sha);
        assert_eq!(second.round, 2);
        assert_eq!(second.repo_url, first.repo_url);
        assert_eq!(second.pages_url, first.pages_url);
        assert!(h.text.prompts.lock()[1].contains("hand edit"));

        let calls = h.host.calls()[before..].to_vec();
        assert!(calls.iter().all(|c| !matches!(
            c,
            HostCall::CreateRepository(_) | HostCall::EnablePages(_)
        )));
        assert_eq!(puts_to(&calls, "index.html"), vec![Some(outside_sha)]);
        assert_eq!(h.host.file_text("demo-1", "index.html").unwrap().trim(), PAGE_V2);
        let readme = h.host.file_text("demo-1", "README.md").unwrap();
        assert!(readme.contains("a calculator page"));
        assert!(readme.contains("## Round 2\n\nadd a dark mode toggle"));
        assert_eq!(h.notes.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn round_two_stale_token_aborts_before_readme() {
        let h = harness(&[PAGE_V1, PAGE_V2], ExistingRepoPolicy::Fail);
        h.orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();

        let host = h.host.clone();
        h.text.during_generation(move || {
            host.overwrite("demo-1", "index.html", "<!DOCTYPE html><p>racing writer</p>");
        });
        let before = h.host.calls().len();

        let failure = h
            .orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap_err();
        assert_eq!(failure.state, RoundState::Publishing);
        assert!(matches!(failure.error, RoundError::Conflict { ref path } if path == "index.html"));

        let calls = h.host.calls()[before..].to_vec();
        assert!(
            calls.iter().all(|c| !matches!(
                c,
                HostCall::GetFile { path, .. } | HostCall::PutFile { path, .. } if path == "README.md"
            )),
            "README must not be touched after a homepage conflict: {calls:?}"
        );
        assert_eq!(h.notes.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn round_two_readme_failure_is_not_fatal() {
        let h = harness(&[PAGE_V1, PAGE_V2], ExistingRepoPolicy::Fail);
        h.orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();
        h.host.fail_puts_to("README.md");

        let second = h
            .orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap();
        assert_eq!(second.round, 2);
        assert_eq!(h.notes.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn round_two_without_homepage_is_missing_artifact() {
        let h = harness(&[PAGE_V2], ExistingRepoPolicy::Fail);
        h.host.create_repository("demo-1").await.unwrap();

        let failure = h
            .orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap_err();
        assert_eq!(failure.state, RoundState::Generating);
        assert!(matches!(failure.error, RoundError::MissingArtifact { .. }));
        assert!(h.text.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn round_two_without_repository_is_missing_artifact() {
        let h = harness(&[PAGE_V2], ExistingRepoPolicy::Fail);
        let failure = h
            .orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            RoundError::MissingArtifact { ref path } if path == "index.html"
        ));
        assert!(puts_to(&h.host.calls(), "index.html").is_empty());
        assert!(h.notes.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn round_two_recreates_missing_readme() {
        let h = harness(&[PAGE_V1, PAGE_V2], ExistingRepoPolicy::Fail);
        h.orchestrator
            .execute(&task(Round::Create, "a calculator page"))
            .await
            .unwrap();
        assert!(h.host.remove("demo-1", "README.md"));
        let before = h.host.calls().len();

        h.orchestrator
            .execute(&task(Round::Revise, "add a dark mode toggle"))
            .await
            .unwrap();

        let calls = h.host.calls()[before..].to_vec();
        assert_eq!(puts_to(&calls, "README.md"), vec![None]);
        let readme = h.host.file_text("demo-1", "README.md").unwrap();
        assert!(readme.starts_with("# demo-1\n"));
        assert!(readme.contains("https://octo.github.io/demo-1/"));
        assert!(readme.contains("## Round 2\n\nadd a dark mode toggle"));
        assert_eq!(h.notes.sent.lock().len(), 2);
    }
}
