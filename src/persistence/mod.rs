//! Persistence layer for run history

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteHistoryStore;

pub use crate::core::RunStatus;
use crate::core::RunResult;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run ID
    pub run_id: Uuid,

    /// Pipeline name
    pub pipeline_name: String,

    /// Run status
    pub status: RunStatus,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run ended (None if it never finished cleanly)
    pub finished_at: Option<DateTime<Utc>>,

    /// Process exit code reported for the run
    pub exit_code: i32,

    /// Steps the pipeline moved past, in order
    pub completed_steps: Vec<String>,

    /// Step that halted or was interrupted
    pub failed_step: Option<String>,

    /// Steps that failed but allowed the pipeline to continue
    pub continued_failures: Vec<String>,
}

/// Trait for history backends
#[async_trait::async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Save a run
    async fn save_run(&self, run: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs of a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// Most recent runs across all pipelines, newest first
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>>;

    /// List all pipeline names with recorded runs
    async fn list_pipelines(&self) -> Result<Vec<String>>;
}

/// In-memory history (for testing or ephemeral use)
#[derive(Default)]
pub struct InMemoryHistory {
    runs: RwLock<HashMap<Uuid, RunSummary>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(runs: &mut [RunSummary]) {
    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

#[async_trait::async_trait]
impl HistoryBackend for InMemoryHistory {
    async fn save_run(&self, run: &RunSummary) -> Result<()> {
        self.runs.write().await.insert(run.run_id, run.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        Ok(self.runs.read().await.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<_> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.pipeline_name == pipeline_name)
            .cloned()
            .collect();
        newest_first(&mut runs);
        Ok(runs)
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<_> = self.runs.read().await.values().cloned().collect();
        newest_first(&mut runs);
        runs.truncate(limit);
        Ok(runs)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let mut names: Vec<_> = self
            .runs
            .read()
            .await
            .values()
            .map(|r| r.pipeline_name.clone())
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// Create a summary from a finished run
pub fn create_summary(result: &RunResult) -> RunSummary {
    RunSummary {
        run_id: result.run_id,
        pipeline_name: result.pipeline_name.clone(),
        status: result.status(),
        started_at: result.started_at,
        finished_at: Some(result.finished_at),
        exit_code: result.exit_code,
        completed_steps: result.completed_steps.clone(),
        failed_step: result.failed_step.clone(),
        continued_failures: result
            .continued_failures()
            .into_iter()
            .map(|r| r.name.clone())
            .collect(),
    }
}

/// Open the default on-disk history store
#[cfg(feature = "sqlite")]
pub async fn open_default_history() -> Result<Arc<dyn HistoryBackend>> {
    Ok(Arc::new(SqliteHistoryStore::with_default_path().await?))
}

/// Without SQLite support history only lives for the current process
#[cfg(not(feature = "sqlite"))]
pub async fn open_default_history() -> Result<Arc<dyn HistoryBackend>> {
    tracing::warn!("Built without the `sqlite` feature, run history is not persisted");
    Ok(Arc::new(InMemoryHistory::new()))
}
