use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;
use crate::models::profile::EnrichedMember;
use crate::services::domain_finder::DomainFinder;

#[derive(Debug, Deserialize, Default)]
struct ProfileEnvelope {
    #[serde(default)]
    data: ProfileData,
}

#[derive(Debug, Deserialize, Default)]
struct ProfileData {
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<String>,
    headline: Option<String>,
    occupation: Option<String>,
    location: Option<String>,
    #[serde(default)]
    experiences: Vec<Experience>,
}

#[derive(Debug, Deserialize, Default)]
struct Experience {
    company: Option<ExperienceCompany>,
}

#[derive(Debug, Deserialize, Default)]
struct ExperienceCompany {
    name: Option<String>,
    url: Option<String>,
    website: Option<String>,
}

/// Calls the vendor profile API for a LinkedIn URL and normalises the
/// response into an [`EnrichedMember`] (§4.4). Company domain
/// derivation falls back to the Domain Finder when the vendor payload
/// carries no usable company URL.
pub struct ProfileEnricher<'a> {
    client: reqwest::Client,
    rapidapi_host: String,
    rapidapi_key: String,
    domain_finder: Option<&'a DomainFinder>,
}

impl<'a> ProfileEnricher<'a> {
    pub fn new(
        rapidapi_host: impl Into<String>,
        rapidapi_key: impl Into<String>,
        timeout: Duration,
        domain_finder: Option<&'a DomainFinder>,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            rapidapi_host: rapidapi_host.into(),
            rapidapi_key: rapidapi_key.into(),
            domain_finder,
        })
    }

    pub async fn enrich_single(&self, linkedin_url: &str) -> EnrichedMember {
        let linkedin_url = normalize_linkedin_url(linkedin_url);

        let response = self
            .client
            .get(format!("https://{}/get-linkedin-profile", self.rapidapi_host))
            .query(&[("linkedin_url", linkedin_url.as_str())])
            .header("X-RapidAPI-Key", &self.rapidapi_key)
            .header("X-RapidAPI-Host", &self.rapidapi_host)
            .send()
            .await;

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(url = %linkedin_url, status = %resp.status(), "profile enrichment failed");
                return EnrichedMember::bare(linkedin_url);
            }
            Err(e) => {
                tracing::warn!(url = %linkedin_url, error = %e, "profile enrichment request failed");
                return EnrichedMember::bare(linkedin_url);
            }
        };

        let envelope: ProfileEnvelope = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(url = %linkedin_url, error = %e, "malformed profile response");
                return EnrichedMember::bare(linkedin_url);
            }
        };

        let data = envelope.data;
        let experience = data.experiences.first();
        let company_name = experience.and_then(|e| e.company.as_ref()).and_then(|c| c.name.clone());

        let mut company_domain = experience
            .and_then(|e| e.company.as_ref())
            .and_then(|c| c.url.clone().or_else(|| c.website.clone()))
            .and_then(|url| extract_domain(&url));

        if company_domain.is_none() {
            if let (Some(finder), Some(name)) = (self.domain_finder, company_name.as_deref()) {
                if let Some(domain) = finder.find_domain(name).await {
                    tracing::info!(company = name, domain, "found domain via MX lookup");
                    company_domain = Some(domain);
                }
            }
        }

        EnrichedMember {
            linkedin_url,
            first_name: data.first_name,
            last_name: data.last_name,
            full_name: data.full_name,
            job_title: data.headline.or(data.occupation),
            company_name,
            company_domain,
            location: data.location,
            email: None,
            email_verified: false,
        }
    }
}

fn normalize_linkedin_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    trimmed.split('?').next().unwrap_or(trimmed).to_string()
}

fn extract_domain(url: &str) -> Option<String> {
    let with_scheme = if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{url}")
    };

    let without_scheme = with_scheme.splitn(2, "://").nth(1)?;
    let host = without_scheme.split('/').next()?;
    let host = host.strip_prefix("www.").unwrap_or(host);

    if host.is_empty() || host.contains("linkedin.com") {
        None
    } else {
        Some(host.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_slash_and_query() {
        assert_eq!(
            normalize_linkedin_url("https://linkedin.com/in/adalovelace/?trk=abc"),
            "https://linkedin.com/in/adalovelace"
        );
    }

    #[test]
    fn extracts_domain_and_strips_www() {
        assert_eq!(extract_domain("https://www.example.com/about"), Some("example.com".to_string()));
    }

    #[test]
    fn rejects_linkedin_domains() {
        assert_eq!(extract_domain("https://www.linkedin.com/company/acme"), None);
    }

    #[test]
    fn handles_bare_host_without_scheme() {
        assert_eq!(extract_domain("example.com"), Some("example.com".to_string()));
    }
}
