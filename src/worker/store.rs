use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::Repository;
use crate::error::Result;

/// Last-run timestamps (unix seconds) keyed by job.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn last_run(&self, key: &str) -> Result<Option<i64>>;

    async fn mark_run(&self, key: &str, at: i64) -> Result<()>;
}

/// Timestamps kept in the `schedule_runs` table; survives restarts.
pub struct SqliteScheduleStore {
    repository: Repository,
}

impl SqliteScheduleStore {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl ScheduleStore for SqliteScheduleStore {
    async fn last_run(&self, key: &str) -> Result<Option<i64>> {
        self.repository.get_last_run(key).await
    }

    async fn mark_run(&self, key: &str, at: i64) -> Result<()> {
        self.repository.set_last_run(key, at).await
    }
}

/// Process-local timestamps. Everything is forgotten on restart, so every
/// job becomes due again when the worker starts.
#[derive(Default)]
pub struct MemoryScheduleStore {
    runs: Mutex<HashMap<String, i64>>,
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn last_run(&self, key: &str) -> Result<Option<i64>> {
        let runs = self.runs.lock().map_err(|_| anyhow::anyhow!("schedule store poisoned"))?;
        Ok(runs.get(key).copied())
    }

    async fn mark_run(&self, key: &str, at: i64) -> Result<()> {
        let mut runs = self.runs.lock().map_err(|_| anyhow::anyhow!("schedule store poisoned"))?;
        runs.insert(key.to_string(), at);
        Ok(())
    }
}
