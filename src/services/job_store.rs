use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::job::{Job, JobKind, JobRow, JobStatus, Task};

/// Persistent record of jobs and sub-tasks — the single source of
/// truth for Job state (§5). Every write here commits immediately;
/// the orchestrator never caches Job state across an `await`.
pub struct JobStore {
    pool: PgPool,
}

#[derive(Default)]
pub struct JobFilters {
    pub status: Option<JobStatus>,
    pub kind: Option<JobKind>,
}

impl JobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        kind: JobKind,
        config: serde_json::Value,
        total_items: i64,
        priority: i32,
        webhook_url: Option<String>,
        user_id: Option<Uuid>,
    ) -> EngineResult<Job> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO async_jobs
                (id, user_id, kind, status, priority, config, total_items,
                 processed_items, failed_items, webhook_url, created_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, 0, 0, $7, $8)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(kind.as_str())
        .bind(priority)
        .bind(&config)
        .bind(total_items)
        .bind(&webhook_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Job {
            id,
            user_id,
            kind,
            status: JobStatus::Pending,
            priority,
            config,
            total_items,
            processed_items: 0,
            failed_items: 0,
            result: None,
            error_message: None,
            error_details: None,
            webhook_url,
            created_at: now,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            estimated_completion: None,
        })
    }

    pub async fn get(&self, job_id: Uuid) -> EngineResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM async_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Job::try_from)
            .transpose()
            .map_err(EngineError::InvalidConfig)
    }

    pub async fn list(
        &self,
        filters: JobFilters,
        page: i64,
        per_page: i64,
    ) -> EngineResult<(Vec<Job>, i64)> {
        let status = filters.status.map(|s| s.as_str());
        let kind = filters.kind.map(|k| k.as_str());
        let offset = (page.max(1) - 1) * per_page;

        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT * FROM async_jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR kind = $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(status)
        .bind(kind)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM async_jobs
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::text IS NULL OR kind = $2)
            "#,
        )
        .bind(status)
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        let jobs = rows
            .into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::InvalidConfig)?;

        Ok((jobs, total))
    }

    /// Atomically claims up to `limit` runnable jobs using
    /// `SELECT ... FOR UPDATE SKIP LOCKED`, the same pattern the
    /// upstream job queue uses to let multiple worker processes share
    /// one queue without double-claiming a row.
    pub async fn claim_next(&self, limit: i64) -> EngineResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            r#"
            WITH claimed AS (
                SELECT id FROM async_jobs
                WHERE status IN ('pending', 'queued')
                ORDER BY priority DESC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE async_jobs
            SET status = 'running', started_at = NOW()
            FROM claimed
            WHERE async_jobs.id = claimed.id
            RETURNING async_jobs.*
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Job::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(EngineError::InvalidConfig)
    }

    pub async fn update_progress(&self, job_id: Uuid, processed_items: i64, failed_items: i64) -> EngineResult<()> {
        sqlx::query(
            "UPDATE async_jobs SET processed_items = $2, failed_items = $3 WHERE id = $1",
        )
        .bind(job_id)
        .bind(processed_items)
        .bind(failed_items)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete(&self, job_id: Uuid, result: serde_json::Value) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE async_jobs
            SET status = 'completed', result = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail(&self, job_id: Uuid, error_message: &str) -> EngineResult<()> {
        sqlx::query(
            r#"
            UPDATE async_jobs
            SET status = 'failed', error_message = $2, completed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flips the job to `cancelled` unless it is already terminal, and
    /// bulk-cancels any still-pending child tasks. Returns whether the
    /// cancellation took effect.
    pub async fn cancel(&self, job_id: Uuid) -> EngineResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE async_jobs
            SET status = 'cancelled', completed_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'failed', 'cancelled')
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            sqlx::query("UPDATE job_tasks SET status = 'cancelled' WHERE job_id = $1 AND status = 'pending'")
                .bind(job_id)
                .execute(&self.pool)
                .await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Cheap status-only read for the cancellation poll at each item
    /// boundary (§4.5.1) — avoids pulling the full Job row every time.
    pub async fn is_cancelled(&self, job_id: Uuid) -> EngineResult<bool> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM async_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(status.as_deref() == Some("cancelled"))
    }

    pub async fn retry_failed_tasks(&self, job_id: Uuid) -> EngineResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE job_tasks
            SET status = 'pending', next_retry_at = NULL
            WHERE job_id = $1 AND status = 'failed' AND attempts < max_attempts
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Materialises a Task row for a single failed item. Called only
    /// on failure — per §9's task-retry-plumbing decision, successful
    /// items never get a Task row.
    pub async fn record_failed_task(
        &self,
        job_id: Uuid,
        task_type: &str,
        input_data: serde_json::Value,
        error_message: &str,
    ) -> EngineResult<Task> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO job_tasks
                (id, job_id, task_type, status, input_data, error_message,
                 attempts, max_attempts, last_attempt_at)
            VALUES ($1, $2, $3, 'failed', $4, $5, 1, 3, $6)
            "#,
        )
        .bind(id)
        .bind(job_id)
        .bind(task_type)
        .bind(&input_data)
        .bind(error_message)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Task {
            id,
            job_id,
            task_type: task_type.to_string(),
            status: JobStatus::Failed.as_str().to_string(),
            input_data,
            output_data: None,
            error_message: Some(error_message.to_string()),
            attempts: 1,
            max_attempts: 3,
            last_attempt_at: Some(now),
            next_retry_at: None,
            completed_at: None,
        })
    }
}
