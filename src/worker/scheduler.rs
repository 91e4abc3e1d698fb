use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::store::ScheduleStore;
use crate::config::{WorkerConfig, WorkerJob};
use crate::error::Result;
use crate::models::{DraftOutcome, DraftRequest};
use crate::pipeline::Engine;

const DAY: i64 = 24 * 60 * 60;

/// Seconds between two runs of a draft job. Unknown values mean weekly.
pub fn frequency_seconds(frequency: &str) -> i64 {
    match frequency.trim().to_ascii_lowercase().as_str() {
        "daily" | "1_per_day" => DAY,
        "weekly" | "1_per_week" => 7 * DAY,
        "monthly" | "1_per_month" => 30 * DAY,
        _ => 7 * DAY,
    }
}

/// What the worker triggers. Implemented by [`Engine`].
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn analyze(&self, site_id: i64) -> Result<()>;

    async fn generate(&self, job: &WorkerJob) -> Result<DraftOutcome>;
}

#[async_trait]
impl JobRunner for Engine {
    async fn analyze(&self, site_id: i64) -> Result<()> {
        Engine::analyze(self, site_id).await.map(|_| ())
    }

    async fn generate(&self, job: &WorkerJob) -> Result<DraftOutcome> {
        let request = DraftRequest {
            topic_key: job.topic_key.clone(),
            frequency: Some(job.frequency.clone()),
            images_count: job.images_count,
        };
        self.generate_draft(job.site_id, &request).await
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub analyzed: usize,
    pub created: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Single-threaded polling loop over the configured jobs.
pub struct Worker {
    runner: Arc<dyn JobRunner>,
    store: Box<dyn ScheduleStore>,
    jobs: Vec<WorkerJob>,
    poll_interval: Duration,
    analyze_interval: i64,
}

impl Worker {
    pub fn new(runner: Arc<dyn JobRunner>, store: Box<dyn ScheduleStore>, config: &WorkerConfig) -> Self {
        Self {
            runner,
            store,
            jobs: config.jobs.clone(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            analyze_interval: config.analyze_interval_secs,
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            jobs = self.jobs.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "Worker started"
        );
        loop {
            let report = self.run_cycle(Utc::now().timestamp()).await;
            tracing::debug!(?report, "Worker cycle finished");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// One pass over all sites and jobs, as of `now` (unix seconds).
    pub async fn run_cycle(&self, now: i64) -> CycleReport {
        let mut report = CycleReport::default();

        let mut seen = HashSet::new();
        let sites: Vec<i64> = self
            .jobs
            .iter()
            .map(|job| job.site_id)
            .filter(|id| seen.insert(*id))
            .collect();

        for site_id in sites {
            let key = format!("analyze:{site_id}");
            if !self.is_due(&key, self.analyze_interval, now).await {
                continue;
            }
            match self.runner.analyze(site_id).await {
                Ok(()) => {
                    report.analyzed += 1;
                    self.mark(&key, now).await;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(site_id, kind = e.kind(), "Scheduled analyze failed: {}", e);
                }
            }
        }

        for job in &self.jobs {
            let key = format!("draft:{}:{}", job.site_id, job.topic_key);
            if !self.is_due(&key, frequency_seconds(&job.frequency), now).await {
                continue;
            }
            match self.runner.generate(job).await {
                Ok(outcome) => {
                    if outcome.is_duplicate() {
                        report.duplicates += 1;
                    } else {
                        report.created += 1;
                    }
                    tracing::info!(
                        site_id = job.site_id,
                        topic_key = %job.topic_key,
                        post_id = outcome.post_id(),
                        duplicate = outcome.is_duplicate(),
                        "Scheduled draft finished"
                    );
                    self.mark(&key, now).await;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        site_id = job.site_id,
                        topic_key = %job.topic_key,
                        kind = e.kind(),
                        "Scheduled draft failed, will retry next cycle: {}",
                        e
                    );
                }
            }
        }

        report
    }

    async fn is_due(&self, key: &str, interval: i64, now: i64) -> bool {
        match self.store.last_run(key).await {
            Ok(Some(last)) => now - last >= interval,
            Ok(None) => true,
            Err(e) => {
                tracing::warn!(job_key = key, "Could not read schedule, skipping: {}", e);
                false
            }
        }
    }

    async fn mark(&self, key: &str, now: i64) {
        if let Err(e) = self.store.mark_run(key, now).await {
            tracing::warn!(job_key = key, "Could not record run: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::worker::MemoryScheduleStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRunner {
        calls: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
    }

    impl FakeRunner {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn fail(&self, call: &str, failing: bool) {
            let mut set = self.failing.lock().unwrap();
            if failing {
                set.insert(call.to_string());
            } else {
                set.remove(call);
            }
        }

        fn record(&self, call: String) -> Result<()> {
            let failing = self.failing.lock().unwrap().contains(&call);
            self.calls.lock().unwrap().push(call);
            if failing {
                Err(AppError::remote(502, "bad gateway"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl JobRunner for FakeRunner {
        async fn analyze(&self, site_id: i64) -> Result<()> {
            self.record(format!("analyze:{site_id}"))
        }

        async fn generate(&self, job: &WorkerJob) -> Result<DraftOutcome> {
            self.record(format!("draft:{}:{}", job.site_id, job.topic_key))?;
            Ok(DraftOutcome::Created {
                article_id: 1,
                post_id: 1,
                url: None,
            })
        }
    }

    fn job(site_id: i64, topic: &str, frequency: &str) -> WorkerJob {
        WorkerJob {
            site_id,
            topic_key: topic.into(),
            frequency: frequency.into(),
            images_count: 1,
        }
    }

    fn worker(runner: Arc<FakeRunner>, store: MemoryScheduleStore, jobs: Vec<WorkerJob>) -> Worker {
        let config = WorkerConfig {
            jobs,
            ..WorkerConfig::default()
        };
        Worker::new(runner, Box::new(store), &config)
    }

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn frequencies_map_to_fixed_durations() {
        assert_eq!(frequency_seconds("daily"), DAY);
        assert_eq!(frequency_seconds("1_per_day"), DAY);
        assert_eq!(frequency_seconds("1_per_week"), 7 * DAY);
        assert_eq!(frequency_seconds("Monthly"), 30 * DAY);
        assert_eq!(frequency_seconds("every-full-moon"), 7 * DAY);
    }

    #[tokio::test]
    async fn weekly_job_waits_a_full_week() {
        for (days_ago, expected) in [(3, false), (8, true)] {
            let store = MemoryScheduleStore::default();
            store.mark_run("analyze:1", NOW).await.unwrap();
            store
                .mark_run("draft:1:guide", NOW - days_ago * DAY)
                .await
                .unwrap();
            let runner = Arc::new(FakeRunner::default());
            let worker = worker(runner.clone(), store, vec![job(1, "guide", "1_per_week")]);

            worker.run_cycle(NOW).await;
            let ran = runner.calls().contains(&"draft:1:guide".to_string());
            assert_eq!(ran, expected, "last run {days_ago} days ago");
        }
    }

    #[tokio::test]
    async fn analyze_runs_once_per_site_before_drafts() {
        let runner = Arc::new(FakeRunner::default());
        let worker = worker(
            runner.clone(),
            MemoryScheduleStore::default(),
            vec![job(1, "roofing", "daily"), job(1, "gutters", "weekly"), job(2, "guide", "weekly")],
        );

        let report = worker.run_cycle(NOW).await;
        assert_eq!(
            runner.calls(),
            vec!["analyze:1", "analyze:2", "draft:1:roofing", "draft:1:gutters", "draft:2:guide"]
        );
        assert_eq!(report.analyzed, 2);
        assert_eq!(report.created, 3);

        // Nothing is due one hour later.
        let report = worker.run_cycle(NOW + 3600).await;
        assert_eq!(report, CycleReport::default());
        assert_eq!(runner.calls().len(), 5);

        // The daily job and the analyses come back after a day.
        worker.run_cycle(NOW + DAY).await;
        let calls = runner.calls();
        assert_eq!(&calls[5..], ["analyze:1", "analyze:2", "draft:1:roofing"]);
    }

    #[tokio::test]
    async fn failed_job_is_retried_next_cycle() {
        let runner = Arc::new(FakeRunner::default());
        runner.fail("draft:1:guide", true);
        let worker = worker(runner.clone(), MemoryScheduleStore::default(), vec![job(1, "guide", "weekly")]);

        let report = worker.run_cycle(NOW).await;
        assert_eq!(report.failed, 1);

        runner.fail("draft:1:guide", false);
        let report = worker.run_cycle(NOW + 60).await;
        assert_eq!(report.created, 1);
        assert_eq!(report.analyzed, 0);
        assert_eq!(
            runner.calls(),
            vec!["analyze:1", "draft:1:guide", "draft:1:guide"]
        );
    }
}
