use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The kind of work a [`Job`] performs. Drives stage selection in the
/// orchestrator (see `orchestrator::stages`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    ScrapeProfiles,
    BulkVerifyLeads,
    BulkVerifyEmails,
    EnrichEmails,
    // Reserved kinds kept for parity with the upstream job taxonomy.
    // Accepted and stored, but there is no stage implementation for
    // them; the orchestrator fails them fast rather than silently
    // dropping the job.
    ImportCsv,
    ExportLeads,
    GenerateContent,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::ScrapeProfiles => "scrape_profiles",
            JobKind::BulkVerifyLeads => "bulk_verify_leads",
            JobKind::BulkVerifyEmails => "bulk_verify_emails",
            JobKind::EnrichEmails => "enrich_emails",
            JobKind::ImportCsv => "import_csv",
            JobKind::ExportLeads => "export_leads",
            JobKind::GenerateContent => "generate_content",
        }
    }

    pub fn has_stage(&self) -> bool {
        matches!(
            self,
            JobKind::ScrapeProfiles | JobKind::BulkVerifyLeads | JobKind::BulkVerifyEmails
        )
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scrape_profiles" => Ok(JobKind::ScrapeProfiles),
            "bulk_verify_leads" => Ok(JobKind::BulkVerifyLeads),
            "bulk_verify_emails" => Ok(JobKind::BulkVerifyEmails),
            "enrich_emails" => Ok(JobKind::EnrichEmails),
            "import_csv" => Ok(JobKind::ImportCsv),
            "export_leads" => Ok(JobKind::ExportLeads),
            "generate_content" => Ok(JobKind::GenerateContent),
            other => Err(format!("unknown job kind '{other}'")),
        }
    }
}

/// Lifecycle state shared by [`Job`] and [`Task`].
///
/// Transitions are monotonic except `pending <-> queued` and
/// `running -> paused -> running`; the three terminal states never
/// transition further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "paused" => Ok(JobStatus::Paused),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status '{other}'")),
        }
    }
}

/// One unit of user-visible background work.
///
/// `processed_items + failed_items <= total_items` holds at every
/// commit; see `services::job_store` for the only code path allowed to
/// mutate these counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: JobKind,
    pub status: JobStatus,
    pub priority: i32,

    pub config: serde_json::Value,

    pub total_items: i64,
    pub processed_items: i64,
    pub failed_items: i64,

    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,

    pub webhook_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl Job {
    pub fn progress_percentage(&self) -> f64 {
        if self.total_items == 0 {
            0.0
        } else {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        }
    }
}

/// Raw row shape returned by `sqlx` queries against `async_jobs`; kept
/// distinct from [`Job`] because the kind/status columns are plain
/// strings in Postgres and need a fallible parse on the way out.
#[derive(Debug, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub status: String,
    pub priority: i32,
    pub config: serde_json::Value,
    pub total_items: i64,
    pub processed_items: i64,
    pub failed_items: i64,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub error_details: Option<serde_json::Value>,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub estimated_completion: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = String;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind.parse()?,
            status: row.status.parse()?,
            priority: row.priority,
            config: row.config,
            total_items: row.total_items,
            processed_items: row.processed_items,
            failed_items: row.failed_items,
            result: row.result,
            error_message: row.error_message,
            error_details: row.error_details,
            webhook_url: row.webhook_url,
            created_at: row.created_at,
            scheduled_at: row.scheduled_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            estimated_completion: row.estimated_completion,
        })
    }
}

/// Per-item child of a [`Job`], materialised lazily — only for items
/// that fail (see DESIGN.md's task-retry-plumbing decision). Carries
/// its own retry state so a failed item can be retried independently
/// of the job as a whole.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub job_id: Uuid,
    pub task_type: String,
    pub status: String,
    pub input_data: serde_json::Value,
    pub output_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts && self.status == JobStatus::Failed.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_kind_round_trips_through_its_string_form() {
        for kind in [
            JobKind::ScrapeProfiles,
            JobKind::BulkVerifyLeads,
            JobKind::BulkVerifyEmails,
            JobKind::EnrichEmails,
            JobKind::ImportCsv,
            JobKind::ExportLeads,
            JobKind::GenerateContent,
        ] {
            let parsed: JobKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed.as_str(), kind.as_str());
        }
    }

    #[test]
    fn only_the_three_enrichment_kinds_have_stages() {
        assert!(JobKind::ScrapeProfiles.has_stage());
        assert!(JobKind::BulkVerifyLeads.has_stage());
        assert!(JobKind::BulkVerifyEmails.has_stage());
        assert!(!JobKind::EnrichEmails.has_stage());
        assert!(!JobKind::ImportCsv.has_stage());
    }

    #[test]
    fn terminal_statuses_are_exactly_completed_failed_cancelled() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Paused.is_terminal());
    }

    #[test]
    fn progress_percentage_is_zero_for_an_empty_job() {
        let job = Job {
            id: Uuid::new_v4(),
            user_id: None,
            kind: JobKind::BulkVerifyLeads,
            status: JobStatus::Pending,
            priority: 5,
            config: serde_json::json!({}),
            total_items: 0,
            processed_items: 0,
            failed_items: 0,
            result: None,
            error_message: None,
            error_details: None,
            webhook_url: None,
            created_at: Utc::now(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            estimated_completion: None,
        };
        assert_eq!(job.progress_percentage(), 0.0);
    }
}
