use crate::scheduler::Runner;
use std::time::Duration;
use tracing::{debug, error, info};

/// Background trigger for [`Runner::run_due`].
///
/// Each tick awaits the previous batch, so batches never overlap within one
/// process. A failed batch query is logged and retried on the next tick.
pub async fn run_scheduler_loop(runner: Runner, poll_interval: Duration) {
    info!(interval_secs = poll_interval.as_secs(), "Scheduler engine started");

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        match runner.run_due().await {
            Ok(summary) if summary.selected > 0 => {
                info!(
                    selected = summary.selected,
                    completed = summary.completed,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Schedule batch finished"
                );
            }
            Ok(_) => debug!("No schedules due"),
            Err(e) => error!("Failed to check due schedules: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::{DeploymentResult, Provider, ProviderAdapter, Providers};
    use crate::scheduler::{NewSchedule, ScheduleStatus, ScheduleStore};
    use std::sync::Arc;

    struct Instant;

    #[async_trait::async_trait]
    impl ProviderAdapter for Instant {
        fn provider(&self) -> Provider {
            Provider::Netlify
        }

        async fn deploy(&self, _: &str, _: &str, _: &str) -> crate::error::Result<DeploymentResult> {
            Ok(DeploymentResult {
                url: Some("https://now.netlify.app".to_string()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_loop_picks_up_due_records() {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::storage::open_pool(dir.path().join("e.db").to_str().unwrap()).unwrap();
        let store = ScheduleStore::new(pool);
        let mut providers = Providers::new();
        providers.register(Arc::new(Instant));

        let rec = store
            .create(NewSchedule {
                project_id: "p".to_string(),
                provider: Provider::Netlify,
                name: "now".to_string(),
                html: String::new(),
                css: String::new(),
                scheduled_at: chrono::Utc::now() - chrono::Duration::seconds(1),
            })
            .await
            .unwrap();

        let handle = tokio::spawn(run_scheduler_loop(
            Runner::new(store.clone(), providers),
            Duration::from_millis(20),
        ));

        let mut status = ScheduleStatus::Scheduled;
        for _ in 0..100 {
            status = store.get(&rec.id).await.unwrap().status;
            if status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        assert_eq!(status, ScheduleStatus::Completed);
    }
}
