//! Deferred notifier: one delayed POST of the round result to the evaluator.
//!
//! The delay gives Pages time to build before the evaluator fetches the site.
//! Delivery is attempted once; failures are logged and dropped.

use std::time::Duration;

use crate::error::NotifyError;
use crate::model::RoundResult;

/// Default wait before the callback fires.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(15);

/// Something that can schedule delivery of a finished round.
pub trait Notify: Send + Sync {
    fn schedule(&self, target: &str, result: RoundResult);
}

#[derive(Clone)]
pub struct DeferredNotifier {
    http: reqwest::Client,
    delay: Duration,
}

impl DeferredNotifier {
    pub fn new(delay: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            delay,
        }
    }

    /// POST the result once.
    pub async fn deliver(&self, target: &str, result: &RoundResult) -> Result<(), NotifyError> {
        let resp = self
            .http
            .post(target)
            .header("Content-Type", "application/json")
            .json(result)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl Notify for DeferredNotifier {
    fn schedule(&self, target: &str, result: RoundResult) {
        let notifier = self.clone();
        let target = target.to_string();
        tracing::info!(
            task = %result.task,
            round = result.round,
            delay_secs = self.delay.as_secs_f64(),
            "Notification scheduled"
        );
        tokio::spawn(async move {
            tokio::time::sleep(notifier.delay).await;
            match notifier.deliver(&target, &result).await {
                Ok(()) => tracing::info!(
                    task = %result.task,
                    round = result.round,
                    commit = %result.commit_sha,
                    "Evaluation URL notified"
                ),
                Err(e) => tracing::error!(
                    task = %result.task,
                    round = result.round,
                    error = %e,
                    "Notification failed, not retrying"
                ),
            }
        });
    }
}
