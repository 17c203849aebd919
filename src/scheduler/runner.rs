//! Executes due schedule records through the provider adapters.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::record::ScheduleRecord;
use super::store::ScheduleStore;
use crate::error::Result;
use crate::publish::Providers;

/// Maximum records executed by one `run_due` call unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 5;

const FALLBACK_FAILURE: &str = "Deployment failed";

/// Counts for one `run_due` invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub selected: usize,
    pub completed: usize,
    pub failed: usize,
    /// Claimed by another runner between selection and claim.
    pub skipped: usize,
}

#[derive(Clone)]
pub struct Runner {
    store: ScheduleStore,
    providers: Providers,
    batch_size: usize,
}

enum Outcome {
    Completed(String),
    Failed(String),
}

impl Runner {
    pub fn new(store: ScheduleStore, providers: Providers) -> Self {
        Self {
            store,
            providers,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    /// Execute up to one batch of due records, one after another.
    ///
    /// Deploy failures never escape: they end up on the record. Only a failed
    /// batch query is returned as an error.
    pub async fn run_due(&self) -> Result<RunSummary> {
        self.run_due_at(Utc::now()).await
    }

    pub async fn run_due_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let batch = self.store.due(now, self.batch_size).await?;
        let mut summary = RunSummary {
            selected: batch.len(),
            ..Default::default()
        };
        if batch.is_empty() {
            return Ok(summary);
        }
        info!(count = batch.len(), "Running due schedules");

        for record in batch {
            match self.store.claim(&record.id, Utc::now()).await {
                Ok(true) => debug!(schedule_id = %record.id, "Claimed schedule"),
                Ok(false) => {
                    debug!(schedule_id = %record.id, "Schedule already claimed, skipping");
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    error!(schedule_id = %record.id, "Failed to claim schedule: {}", e);
                    summary.skipped += 1;
                    continue;
                }
            }

            let saved = match self.execute(&record).await {
                Outcome::Completed(url) => {
                    info!(schedule_id = %record.id, provider = %record.provider, %url, "Scheduled deploy completed");
                    summary.completed += 1;
                    self.store.complete(&record.id, &url).await
                }
                Outcome::Failed(message) => {
                    warn!(schedule_id = %record.id, provider = %record.provider, error = %message, "Scheduled deploy failed");
                    summary.failed += 1;
                    self.store.fail(&record.id, &message).await
                }
            };
            if let Err(e) = saved {
                error!(schedule_id = %record.id, "Failed to record schedule outcome: {}", e);
            }
        }

        Ok(summary)
    }

    async fn execute(&self, record: &ScheduleRecord) -> Outcome {
        let adapter = match self.providers.get(record.provider) {
            Ok(a) => a,
            Err(e) => return Outcome::Failed(failure_message(&e.to_string())),
        };

        match adapter.deploy(&record.name, &record.html, &record.css).await {
            Ok(result) => match adapter.result_url(&result) {
                Some(url) => Outcome::Completed(url),
                None => Outcome::Failed("Deployment returned no URL".to_string()),
            },
            Err(e) => Outcome::Failed(failure_message(&e.to_string())),
        }
    }
}

fn failure_message(msg: &str) -> String {
    if msg.trim().is_empty() {
        FALLBACK_FAILURE.to_string()
    } else {
        msg.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PublishError;
    use crate::publish::{DeploymentResult, Provider, ProviderAdapter};
    use crate::scheduler::record::{NewSchedule, ScheduleStatus};
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted adapter standing in for a provider.
    struct Scripted {
        provider: Provider,
        reply: std::result::Result<DeploymentResult, String>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn ok(provider: Provider, url: Option<&str>, site_url: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Ok(DeploymentResult {
                    url: url.map(str::to_string),
                    id: Some("dep_1".to_string()),
                    site_url: site_url.map(str::to_string),
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn err(provider: Provider, msg: &str) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Err(msg.to_string()),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for Scripted {
        fn provider(&self) -> Provider {
            self.provider
        }

        async fn deploy(&self, _name: &str, _html: &str, _css: &str) -> Result<DeploymentResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(PublishError::Provider)
        }

        fn result_url(&self, result: &DeploymentResult) -> Option<String> {
            match self.provider {
                Provider::Vercel => result.url.as_ref().map(|h| format!("https://{}", h)),
                Provider::Netlify => result.url.clone().or_else(|| result.site_url.clone()),
            }
        }
    }

    fn setup(adapters: Vec<Arc<Scripted>>) -> (tempfile::TempDir, Runner) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::storage::open_pool(dir.path().join("r.db").to_str().unwrap()).unwrap();
        let mut providers = Providers::new();
        for a in adapters {
            providers.register(a);
        }
        (dir, Runner::new(ScheduleStore::new(pool), providers))
    }

    async fn schedule(runner: &Runner, provider: Provider, offset: Duration) -> ScheduleRecord {
        runner
            .store()
            .create(NewSchedule {
                project_id: "proj".to_string(),
                provider,
                name: "demo".to_string(),
                html: "<h1>demo</h1>".to_string(),
                css: String::new(),
                scheduled_at: Utc::now() + offset,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_due_vercel_record_completes_with_https_url() {
        let (_dir, runner) = setup(vec![Scripted::ok(Provider::Vercel, Some("demo.vercel.app"), None)]);
        let rec = schedule(&runner, Provider::Vercel, -Duration::hours(1)).await;

        let summary = runner.run_due().await.unwrap();
        assert_eq!(summary.completed, 1);

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.status, ScheduleStatus::Completed);
        assert_eq!(done.result_url.as_deref(), Some("https://demo.vercel.app"));
        assert!(done.error_message.is_none());
        assert!(done.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_rejection_is_recorded_not_returned() {
        let (_dir, runner) = setup(vec![Scripted::err(Provider::Vercel, "quota exceeded")]);
        let rec = schedule(&runner, Provider::Vercel, -Duration::hours(1)).await;

        let summary = runner.run_due().await.unwrap();
        assert_eq!(summary.failed, 1);

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.status, ScheduleStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some("quota exceeded"));
        assert!(done.result_url.is_none());
    }

    #[tokio::test]
    async fn test_empty_error_message_falls_back() {
        let (_dir, runner) = setup(vec![Scripted::err(Provider::Netlify, "")]);
        let rec = schedule(&runner, Provider::Netlify, -Duration::minutes(1)).await;
        runner.run_due().await.unwrap();

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.error_message.as_deref(), Some("Deployment failed"));
    }

    #[tokio::test]
    async fn test_netlify_falls_back_to_site_url() {
        let (_dir, runner) = setup(vec![Scripted::ok(
            Provider::Netlify,
            None,
            Some("https://demo.netlify.app"),
        )]);
        let rec = schedule(&runner, Provider::Netlify, -Duration::minutes(1)).await;
        runner.run_due().await.unwrap();

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.result_url.as_deref(), Some("https://demo.netlify.app"));
    }

    #[tokio::test]
    async fn test_success_without_url_is_failure() {
        let (_dir, runner) = setup(vec![Scripted::ok(Provider::Vercel, None, None)]);
        let rec = schedule(&runner, Provider::Vercel, -Duration::minutes(1)).await;
        runner.run_due().await.unwrap();

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.status, ScheduleStatus::Failed);
        assert_eq!(done.error_message.as_deref(), Some("Deployment returned no URL"));
    }

    #[tokio::test]
    async fn test_unregistered_provider_fails_record() {
        let (_dir, runner) = setup(vec![]);
        let rec = schedule(&runner, Provider::Netlify, -Duration::minutes(1)).await;
        runner.run_due().await.unwrap();

        let done = runner.store().get(&rec.id).await.unwrap();
        assert_eq!(done.status, ScheduleStatus::Failed);
        assert!(done.error_message.unwrap().contains("netlify"));
    }

    #[tokio::test]
    async fn test_future_records_are_left_alone() {
        let adapter = Scripted::ok(Provider::Vercel, Some("x.vercel.app"), None);
        let (_dir, runner) = setup(vec![adapter.clone()]);
        let rec = schedule(&runner, Provider::Vercel, Duration::hours(1)).await;

        let summary = runner.run_due().await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            runner.store().get(&rec.id).await.unwrap().status,
            ScheduleStatus::Scheduled
        );
    }

    #[tokio::test]
    async fn test_batch_is_capped_and_terminal_records_not_rerun() {
        let adapter = Scripted::ok(Provider::Vercel, Some("x.vercel.app"), None);
        let (_dir, runner) = setup(vec![adapter.clone()]);
        for i in 0..7 {
            schedule(&runner, Provider::Vercel, -Duration::minutes(30 - i)).await;
        }

        let first = runner.run_due().await.unwrap();
        assert_eq!(first.selected, 5);
        assert_eq!(first.completed, 5);

        let second = runner.run_due().await.unwrap();
        assert_eq!(second.selected, 2);

        let third = runner.run_due().await.unwrap();
        assert_eq!(third.selected, 0);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let adapter = Scripted::ok(Provider::Vercel, Some("x.vercel.app"), None);
        let (_dir, runner) = setup(vec![adapter]);
        let runner = runner.with_batch_size(2);
        for _ in 0..3 {
            schedule(&runner, Provider::Vercel, -Duration::minutes(5)).await;
        }
        assert_eq!(runner.run_due().await.unwrap().selected, 2);
    }
}
