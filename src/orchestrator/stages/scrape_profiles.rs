use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::job::Job;
use crate::models::profile::EnrichedMember;
use crate::orchestrator::stages::build_verifier;
use crate::orchestrator::{ProgressTracker, StageOutcome};
use crate::services::domain_finder::DomainFinder;
use crate::services::email_finder::EmailFinder;
use crate::services::job_store::JobStore;
use crate::services::permutator::Permutator;
use crate::services::profile_enricher::ProfileEnricher;

#[derive(Debug, Deserialize)]
struct StageConfig {
    urls: Vec<String>,
}

/// The scrape-profiles stage (§4.8): chunked parallel profile
/// enrichment feeding a sequential email-finding pass, streamed to the
/// progress writer through a bounded channel (§9's async-generator
/// note). The producer and consumer futures are driven concurrently
/// by `tokio::join!` rather than a spawned task, since
/// [`ProfileEnricher`] borrows its [`DomainFinder`] and can't cross a
/// `'static` task boundary without an `Arc` it has no other use for.
pub async fn run(job: &Job, store: &JobStore, config: &Config) -> EngineResult<StageOutcome> {
    let stage_config: StageConfig = serde_json::from_value(job.config.clone())
        .map_err(|e| EngineError::InvalidConfig(format!("scrape_profiles config: {e}")))?;

    let rapidapi_key = config
        .rapidapi_key
        .as_deref()
        .ok_or_else(|| EngineError::InvalidConfig("RAPIDAPI_KEY is not configured".to_string()))?;

    let domain_finder = DomainFinder::new(
        Duration::from_secs(config.dns_query_timeout_secs),
        Duration::from_secs(config.dns_total_timeout_secs),
    )?;

    let enricher = ProfileEnricher::new(
        &config.rapidapi_host,
        rapidapi_key,
        Duration::from_secs(config.profile_http_timeout_secs),
        Some(&domain_finder),
    )?;

    // The verifier is optional here (§4.4): without one configured,
    // enrichment still runs, it simply never resolves an email.
    let verifier = build_verifier(config).ok();
    let permutator = Permutator::default();
    let email_finder = verifier.as_ref().map(|v| EmailFinder::new(&permutator, v));

    let (tx, mut rx) = mpsc::channel::<EnrichedMember>(config.scrape_chunk_size.max(1));

    let producer = produce(&stage_config.urls, &enricher, email_finder.as_ref(), config, store, job.id, tx);
    let mut tracker = ProgressTracker::new(store, job.id, config.scrape_chunk_size);
    let mut members = Vec::with_capacity(stage_config.urls.len());
    let consumer = consume(&mut rx, &mut tracker, &mut members, store, job.id);

    let (cancelled, ()) = tokio::join!(producer, consumer);
    let cancelled = cancelled?;

    tracker.flush().await?;

    if cancelled {
        return Ok(StageOutcome::Cancelled);
    }

    Ok(StageOutcome::Completed(json!({ "results": members })))
}

/// Enriches URLs in chunks of `scrape_chunk_size`, fans each chunk out
/// to at most `scrape_enrich_concurrency` concurrent profile calls,
/// then runs the (shared-limiter, hence sequential) email finder over
/// the chunk before sleeping 1s and moving to the next. Returns
/// whether it stopped early due to cancellation.
async fn produce(
    urls: &[String],
    enricher: &ProfileEnricher<'_>,
    email_finder: Option<&EmailFinder<'_>>,
    config: &Config,
    store: &JobStore,
    job_id: uuid::Uuid,
    tx: mpsc::Sender<EnrichedMember>,
) -> EngineResult<bool> {
    let chunks: Vec<&[String]> = urls.chunks(config.scrape_chunk_size.max(1)).collect();
    let total_chunks = chunks.len();

    for (chunk_idx, chunk) in chunks.into_iter().enumerate() {
        let enriched: Vec<EnrichedMember> = stream::iter(chunk.iter())
            .map(|url| enricher.enrich_single(url))
            .buffer_unordered(config.scrape_enrich_concurrency.max(1))
            .collect()
            .await;

        for mut member in enriched {
            if let Some(finder) = email_finder {
                if member.company_domain.is_some() {
                    finder.find_email_for_profile(&mut member).await;
                }
            }
            if tx.send(member).await.is_err() {
                // Consumer dropped — nothing more to do.
                return Ok(false);
            }
        }

        if store.is_cancelled(job_id).await? {
            return Ok(true);
        }

        if chunk_idx + 1 < total_chunks {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(false)
}

/// Drains enriched members from the channel, tallies progress, and
/// collects the final result list. Closes when the producer drops its
/// sender.
async fn consume(
    rx: &mut mpsc::Receiver<EnrichedMember>,
    tracker: &mut ProgressTracker<'_>,
    out: &mut Vec<EnrichedMember>,
    store: &JobStore,
    job_id: uuid::Uuid,
) {
    while let Some(member) = rx.recv().await {
        if member.email_verified {
            tracker.record_processed();
        } else {
            tracker.record_failed();
            let input = json!({ "linkedin_url": member.linkedin_url });
            let reason = if member.company_domain.is_none() {
                "no company domain resolved"
            } else {
                "no deliverable email found"
            };
            if let Err(e) = store.record_failed_task(job_id, "enrich_profile", input, reason).await {
                tracing::warn!(job_id = %job_id, error = %e, "failed to materialise task row for unverified profile");
            }
        }
        out.push(member);

        if let Err(e) = tracker.checkpoint().await {
            tracing::warn!(error = %e, "failed to flush scrape-profiles progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_config_parses_url_list() {
        let value = json!({ "urls": ["https://linkedin.com/in/a", "https://linkedin.com/in/b"] });
        let parsed: StageConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.urls.len(), 2);
    }
}
