mod stages;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::job::{Job, JobKind};
use crate::services::job_store::JobStore;

/// What a stage produced when it stopped iterating.
///
/// `Cancelled` is deliberately not an error: the job's status was
/// already flipped by an external `cancel()` call (§4.5.1), and the
/// orchestrator must not overwrite that with `completed`.
pub enum StageOutcome {
    Completed(serde_json::Value),
    Cancelled,
}

/// Per-item progress accumulator shared by every stage.
///
/// Flushes to the store every `flush_every` items and polls
/// cancellation at the same boundary — never mid-HTTP-call (§4.5.1,
/// §5). Counters are monotonic; a flush can under-count relative to
/// the in-memory tally but never over-count relative to the store.
pub struct ProgressTracker<'a> {
    store: &'a JobStore,
    job_id: Uuid,
    flush_every: usize,
    since_flush: usize,
    pub processed: i64,
    pub failed: i64,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(store: &'a JobStore, job_id: Uuid, flush_every: usize) -> Self {
        Self {
            store,
            job_id,
            flush_every: flush_every.max(1),
            since_flush: 0,
            processed: 0,
            failed: 0,
        }
    }

    pub fn record_processed(&mut self) {
        self.processed += 1;
        self.since_flush += 1;
    }

    pub fn record_failed(&mut self) {
        self.failed += 1;
        self.since_flush += 1;
    }

    /// Flushes if a full batch has accumulated, then reports whether
    /// the job has been cancelled in the meantime. Call this at every
    /// item boundary, after the vendor call completes.
    pub async fn checkpoint(&mut self) -> EngineResult<bool> {
        if self.since_flush >= self.flush_every {
            self.flush().await?;
        }
        self.store.is_cancelled(self.job_id).await
    }

    pub async fn flush(&mut self) -> EngineResult<()> {
        self.store.update_progress(self.job_id, self.processed, self.failed).await?;
        self.since_flush = 0;
        Ok(())
    }
}

/// Drives jobs through their state machine: loads, transitions to
/// `running`, dispatches to the stage named by `job.kind`, writes the
/// terminal result, and fires the webhook (§4.5).
pub struct Orchestrator {
    store: Arc<JobStore>,
    pool: PgPool,
    config: Config,
    webhook_client: reqwest::Client,
}

impl Orchestrator {
    pub fn new(store: Arc<JobStore>, pool: PgPool, config: Config) -> EngineResult<Self> {
        let webhook_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_timeout_secs))
            .build()?;
        Ok(Self { store, pool, config, webhook_client })
    }

    /// Runs one job to completion (or cancellation, or failure).
    ///
    /// Returns `Ok(())` when the job was absent, already terminal, or
    /// ran to a terminal state. Returns `Err` only for structural
    /// faults, matching §7: the caller (the worker binary's claim
    /// loop) re-raises this to whatever broker-level retry policy it
    /// implements.
    pub async fn run_job(&self, job_id: Uuid) -> EngineResult<()> {
        let job = match self.store.get(job_id).await? {
            Some(job) => job,
            None => {
                tracing::warn!(%job_id, "job vanished before it could be run");
                return Ok(());
            }
        };

        if job.status.is_terminal() {
            return Ok(());
        }

        tracing::info!(job_id = %job.id, kind = job.kind.as_str(), "running job");

        match self.dispatch(&job).await {
            Ok(StageOutcome::Completed(result)) => {
                self.store.complete(job.id, result.clone()).await?;
                let job_after = self.store.get(job.id).await?.unwrap_or(job);
                webhook::deliver(
                    &self.webhook_client,
                    &job_after,
                    &result,
                    Duration::from_secs(self.config.webhook_timeout_secs),
                )
                .await;
                Ok(())
            }
            Ok(StageOutcome::Cancelled) => {
                tracing::info!(job_id = %job.id, "job observed cancellation at an item boundary");
                Ok(())
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "job failed");
                self.store.fail(job.id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn dispatch(&self, job: &Job) -> EngineResult<StageOutcome> {
        match job.kind {
            JobKind::BulkVerifyLeads => {
                stages::bulk_verify_leads::run(job, &self.store, &self.pool, &self.config).await
            }
            JobKind::BulkVerifyEmails => stages::bulk_verify_emails::run(job, &self.store, &self.config).await,
            JobKind::ScrapeProfiles => stages::scrape_profiles::run(job, &self.store, &self.config).await,
            other => Err(EngineError::UnsupportedKind(other.as_str().to_string())),
        }
    }
}
