use serde::{Deserialize, Serialize};

/// Output of the Profile Enricher (§4.4) and the shape the scrape
/// stage's result payload is built from; field names mirror the CSV
/// export columns for scrape jobs (§6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnrichedMember {
    pub linkedin_url: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub company_domain: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
}

impl EnrichedMember {
    pub fn bare(linkedin_url: impl Into<String>) -> Self {
        Self {
            linkedin_url: linkedin_url.into(),
            ..Default::default()
        }
    }
}
