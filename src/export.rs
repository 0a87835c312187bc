use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::models::job::{Job, JobKind};
use crate::models::lead::VerifiedLead;
use crate::models::profile::EnrichedMember;

/// The two export formats the job-observation surface accepts (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

/// Renders a completed job's `result` in the requested format.
///
/// CSV framing is the one piece of this surface genuinely owned by
/// the core: it encodes the column order §6 specifies per job kind,
/// which only the core knows. Actual delimited-text escaping is
/// intentionally hand-rolled rather than pulled from a crate — no
/// repo in this lineage reaches for one, and the out-of-scope list
/// explicitly carves CSV *parsing* out to the API layer; this is the
/// mirror-image concern (writing, not reading) for a closed, already-typed
/// set of columns.
pub fn export(job: &Job) -> EngineResult<String> {
    export_as(job, ExportFormat::Json)
}

pub fn export_as(job: &Job, format: ExportFormat) -> EngineResult<String> {
    let result = job
        .result
        .as_ref()
        .ok_or_else(|| EngineError::InvalidConfig(format!("job {} has no result to export", job.id)))?;

    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        ExportFormat::Csv => match job.kind {
            JobKind::ScrapeProfiles => csv_scrape(result),
            JobKind::BulkVerifyLeads => csv_leads(result),
            other => Err(EngineError::InvalidConfig(format!("no CSV export defined for job kind '{}'", other.as_str()))),
        },
    }
}

const SCRAPE_COLUMNS: [&str; 10] = [
    "first_name",
    "last_name",
    "full_name",
    "email",
    "email_verified",
    "job_title",
    "company_name",
    "company_domain",
    "linkedin_url",
    "location",
];

const LEADS_COLUMNS: [&str; 4] = ["first_name", "last_name", "website", "email"];

#[derive(Deserialize)]
struct ScrapeResult {
    results: Vec<EnrichedMember>,
}

#[derive(Deserialize)]
struct LeadsResult {
    verified_leads: Vec<VerifiedLead>,
}

fn csv_scrape(result: &serde_json::Value) -> EngineResult<String> {
    let parsed: ScrapeResult =
        serde_json::from_value(result.clone()).map_err(|e| EngineError::InvalidConfig(format!("malformed scrape result: {e}")))?;

    let mut out = csv_header(&SCRAPE_COLUMNS);
    for member in &parsed.results {
        let row = [
            member.first_name.as_deref().unwrap_or(""),
            member.last_name.as_deref().unwrap_or(""),
            member.full_name.as_deref().unwrap_or(""),
            member.email.as_deref().unwrap_or(""),
            if member.email_verified { "true" } else { "false" },
            member.job_title.as_deref().unwrap_or(""),
            member.company_name.as_deref().unwrap_or(""),
            member.company_domain.as_deref().unwrap_or(""),
            member.linkedin_url.as_str(),
            member.location.as_deref().unwrap_or(""),
        ];
        out.push_str(&csv_row(&row));
    }
    Ok(out)
}

fn csv_leads(result: &serde_json::Value) -> EngineResult<String> {
    let parsed: LeadsResult =
        serde_json::from_value(result.clone()).map_err(|e| EngineError::InvalidConfig(format!("malformed leads result: {e}")))?;

    let mut out = csv_header(&LEADS_COLUMNS);
    for lead in &parsed.verified_leads {
        let row = [lead.first_name.as_str(), lead.last_name.as_str(), lead.website.as_str(), lead.email.as_str()];
        out.push_str(&csv_row(&row));
    }
    Ok(out)
}

fn csv_header(columns: &[&str]) -> String {
    csv_row(columns)
}

fn csv_row(fields: &[&str]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
    format!("{}\r\n", escaped.join(","))
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobStatus;
    use serde_json::json;
    use uuid::Uuid;

    fn job_with_result(kind: JobKind, result: serde_json::Value) -> Job {
        Job {
            id: Uuid::new_v4(),
            user_id: None,
            kind,
            status: JobStatus::Completed,
            priority: 5,
            config: json!({}),
            total_items: 1,
            processed_items: 1,
            failed_items: 0,
            result: Some(result),
            error_message: None,
            error_details: None,
            webhook_url: None,
            created_at: chrono::Utc::now(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            estimated_completion: None,
        }
    }

    #[test]
    fn csv_export_of_leads_uses_the_spec_column_order() {
        let job = job_with_result(
            JobKind::BulkVerifyLeads,
            json!({
                "verified_leads": [
                    {"first_name": "Ada", "last_name": "Lovelace", "website": "example.com", "email": "ada.lovelace@example.com"}
                ]
            }),
        );
        let csv = export_as(&job, ExportFormat::Csv).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "first_name,last_name,website,email");
        assert_eq!(lines.next().unwrap(), "Ada,Lovelace,example.com,ada.lovelace@example.com");
    }

    #[test]
    fn csv_escapes_fields_containing_commas() {
        assert_eq!(csv_escape("Smith, Jr."), "\"Smith, Jr.\"");
        assert_eq!(csv_escape("plain"), "plain");
    }

    #[test]
    fn json_export_round_trips_the_stored_result() {
        let job = job_with_result(JobKind::BulkVerifyEmails, json!({"results": []}));
        let out = export_as(&job, ExportFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, json!({"results": []}));
    }

    #[test]
    fn csv_export_is_undefined_for_bulk_verify_emails() {
        let job = job_with_result(JobKind::BulkVerifyEmails, json!({"results": []}));
        assert!(export_as(&job, ExportFormat::Csv).is_err());
    }
}
