use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::job::Job;
use crate::models::lead::EmailVerificationRecord;
use crate::models::verification::VerificationStatus;
use crate::orchestrator::stages::build_verifier;
use crate::orchestrator::{ProgressTracker, StageOutcome};
use crate::services::job_store::JobStore;

#[derive(Debug, Deserialize)]
struct StageConfig {
    emails: Vec<String>,
}

/// The bulk-verify-emails stage (§4.7): no domain grouping, no
/// candidate generation — just one vendor call per input email.
pub async fn run(job: &Job, store: &JobStore, config: &Config) -> EngineResult<StageOutcome> {
    let stage_config: StageConfig = serde_json::from_value(job.config.clone())
        .map_err(|e| EngineError::InvalidConfig(format!("bulk_verify_emails config: {e}")))?;

    let verifier = build_verifier(config)?;
    let mut tracker = ProgressTracker::new(store, job.id, config.verify_progress_flush_every);
    let mut records = Vec::with_capacity(stage_config.emails.len());

    for email in &stage_config.emails {
        let result = verifier.verify(email).await;

        let is_valid = result.status == VerificationStatus::Valid;
        records.push(EmailVerificationRecord {
            email: result.email.clone(),
            status: result.status.as_str().to_string(),
            is_deliverable: result.is_deliverable,
            is_catch_all: result.is_catch_all,
            mx_found: result.mx_found,
            reason: result.reason.clone(),
        });

        if is_valid {
            tracker.record_processed();
        } else {
            tracker.record_failed();
            let input = json!({ "email": email });
            let reason = result.reason.clone().unwrap_or_else(|| result.status.as_str().to_string());
            if let Err(e) = store.record_failed_task(job.id, "verify_email", input, &reason).await {
                tracing::warn!(job_id = %job.id, error = %e, "failed to materialise task row for failed email");
            }
        }

        if tracker.checkpoint().await? {
            tracker.flush().await?;
            return Ok(StageOutcome::Cancelled);
        }
    }

    verifier.close().await;
    tracker.flush().await?;

    Ok(StageOutcome::Completed(json!({ "results": records })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_config_parses_email_list() {
        let value = json!({ "emails": ["a@example.com", "b@example.com"] });
        let parsed: StageConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.emails, vec!["a@example.com", "b@example.com"]);
    }
}
