use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::models::company::Company;
use crate::models::job::Job;
use crate::models::lead::{LeadInput, VerifiedLead};
use crate::models::verification::VerificationStatus;
use crate::orchestrator::stages::{build_verifier, normalize_website};
use crate::orchestrator::{ProgressTracker, StageOutcome};
use crate::services::job_store::JobStore;
use crate::services::permutator::Permutator;

#[derive(Debug, Deserialize)]
struct StageConfig {
    leads: Vec<LeadInput>,
}

/// Confidence assigned to a pattern the moment it is detected from a
/// single verified hit. There is no graded confidence signal upstream
/// of this stage, so the first win is treated as fully confident —
/// matching the original's `detect_pattern` call site, which writes
/// the company row unconditionally on a valid verdict.
const DETECTED_PATTERN_CONFIDENCE: f32 = 1.0;

/// Per-run domain-learning state (§3, §4.6): which domains already
/// have a known winning pattern, which are catch-all, and which are
/// dead (no MX). Scoped to one call of [`run`]; never persisted
/// across jobs by default (§9).
#[derive(Default)]
struct DomainState {
    known_pattern: HashMap<String, String>,
    catch_all: HashSet<String>,
    dead: HashSet<String>,
}

/// The domain-learning batch verifier: groups leads by domain,
/// memoises the winning local-part pattern per domain, and prunes
/// catch-all/dead domains so later leads on the same domain converge
/// in one probe (§4.6).
pub async fn run(job: &Job, store: &JobStore, pool: &PgPool, config: &Config) -> EngineResult<StageOutcome> {
    let stage_config: StageConfig = serde_json::from_value(job.config.clone())
        .map_err(|e| EngineError::InvalidConfig(format!("bulk_verify_leads config: {e}")))?;

    let verifier = build_verifier(config)?;
    let permutator = Permutator::default();
    let mut state = DomainState::default();
    let mut tracker = ProgressTracker::new(store, job.id, config.verify_progress_flush_every);
    let mut verified_leads: Vec<VerifiedLead> = Vec::new();

    // Pre-pass: attach `_domain` and group into per-domain buckets,
    // preserving first-seen domain order and in-bucket input order.
    let mut domain_order: Vec<String> = Vec::new();
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, lead) in stage_config.leads.iter().enumerate() {
        let domain = normalize_website(&lead.website);
        if !buckets.contains_key(&domain) {
            domain_order.push(domain.clone());
        }
        buckets.entry(domain).or_default().push(idx);
    }

    for domain in domain_order {
        let indices = buckets.remove(&domain).unwrap_or_default();

        for idx in indices {
            let lead = &stage_config.leads[idx];

            if state.dead.contains(&domain) {
                tracker.record_failed();
                record_failed_lead(store, job.id, lead, "domain has no MX records").await;
                if tracker.checkpoint().await? {
                    tracker.flush().await?;
                    return Ok(StageOutcome::Cancelled);
                }
                continue;
            }

            let mut candidates = permutator.generate(&lead.first_name, &lead.last_name, &domain);
            if candidates.is_empty() {
                tracker.record_failed();
                record_failed_lead(store, job.id, lead, "no candidate permutations generated").await;
                if tracker.checkpoint().await? {
                    tracker.flush().await?;
                    return Ok(StageOutcome::Cancelled);
                }
                continue;
            }

            if let Some(pattern) = state.known_pattern.get(&domain) {
                if let Some(known_address) = permutator.apply_pattern(pattern, &lead.first_name, &lead.last_name, &domain) {
                    if let Some(pos) = candidates.iter().position(|c| c == &known_address) {
                        let addr = candidates.remove(pos);
                        candidates.insert(0, addr);
                    }
                }
            }

            if state.catch_all.contains(&domain) {
                candidates.truncate(1);
            }

            let mut verified_email: Option<String> = None;
            let mut failure_reason = "no candidate verified as deliverable";

            for email in &candidates {
                let result = verifier.verify(email).await;

                match result.status {
                    VerificationStatus::Valid => {
                        if let Some(pattern) = permutator.detect_pattern(email, &lead.first_name, &lead.last_name) {
                            state.known_pattern.insert(domain.clone(), pattern.clone());
                            if let Err(e) =
                                Company::upsert_pattern(pool, &domain, &pattern, DETECTED_PATTERN_CONFIDENCE).await
                            {
                                tracing::warn!(domain, error = %e, "failed to persist detected email pattern");
                            }
                        }
                        verified_email = Some(email.clone());
                        break;
                    }
                    VerificationStatus::CatchAll => {
                        state.catch_all.insert(domain.clone());
                        if let Err(e) = Company::mark_catch_all(pool, &domain).await {
                            tracing::warn!(domain, error = %e, "failed to persist catch-all domain");
                        }
                        failure_reason = "domain is catch-all";
                        break;
                    }
                    VerificationStatus::Invalid if result.is_no_mx() => {
                        state.dead.insert(domain.clone());
                        failure_reason = "domain has no MX records";
                        break;
                    }
                    _ => continue,
                }
            }

            match verified_email {
                Some(email) => {
                    verified_leads.push(VerifiedLead {
                        first_name: lead.first_name.clone(),
                        last_name: lead.last_name.clone(),
                        website: lead.website.clone(),
                        email,
                    });
                    tracker.record_processed();
                }
                None => {
                    tracker.record_failed();
                    record_failed_lead(store, job.id, lead, failure_reason).await;
                }
            }

            if tracker.checkpoint().await? {
                tracker.flush().await?;
                return Ok(StageOutcome::Cancelled);
            }
        }
    }

    verifier.close().await;
    tracker.flush().await?;

    Ok(StageOutcome::Completed(json!({ "verified_leads": verified_leads })))
}

/// Materialises a Task row for a lead that failed to verify (§9's
/// lazy-Task decision) — best-effort, logged and swallowed on error
/// since it is an observability aid, not the record of truth (that's
/// the Job's own `failed_items` counter).
async fn record_failed_lead(store: &JobStore, job_id: uuid::Uuid, lead: &LeadInput, reason: &str) {
    let input = json!({
        "first_name": lead.first_name,
        "last_name": lead.last_name,
        "website": lead.website,
    });
    if let Err(e) = store.record_failed_task(job_id, "verify_lead", input, reason).await {
        tracing::warn!(job_id = %job_id, error = %e, "failed to materialise task row for failed lead");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_config_parses_leads_array() {
        let value = json!({
            "leads": [
                {"first_name": "Ada", "last_name": "Lovelace", "website": "https://example.com"}
            ]
        });
        let parsed: StageConfig = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.leads.len(), 1);
        assert_eq!(parsed.leads[0].first_name, "Ada");
    }

    #[test]
    fn domain_state_starts_empty() {
        let state = DomainState::default();
        assert!(state.known_pattern.is_empty());
        assert!(state.catch_all.is_empty());
        assert!(state.dead.is_empty());
    }
}
