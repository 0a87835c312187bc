use std::time::Duration;

use serde_json::json;

use crate::models::job::Job;

/// POSTs the terminal result to `job.webhook_url`, if set (§4.5.2).
///
/// Fire-and-forget: a failure is logged and never changes job status
/// or propagates to the caller.
pub async fn deliver(client: &reqwest::Client, job: &Job, result: &serde_json::Value, timeout: Duration) {
    let Some(url) = job.webhook_url.as_deref() else {
        return;
    };

    let payload = json!({
        "job_id": job.id,
        "status": job.status.as_str(),
        "total_items": job.total_items,
        "processed_items": job.processed_items,
        "failed_items": job.failed_items,
        "result": result,
    });

    let outcome = client.post(url).timeout(timeout).json(&payload).send().await;

    match outcome {
        Ok(resp) if resp.status().is_success() => {
            tracing::info!(job_id = %job.id, url, "webhook delivered");
        }
        Ok(resp) => {
            tracing::warn!(job_id = %job.id, url, status = %resp.status(), "webhook rejected");
        }
        Err(e) => {
            tracing::warn!(job_id = %job.id, url, error = %e, "webhook delivery failed");
        }
    }
}
