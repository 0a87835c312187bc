pub mod bulk_verify_emails;
pub mod bulk_verify_leads;
pub mod scrape_profiles;

use crate::error::{EngineError, EngineResult};
use crate::services::verifier::MailTesterNinjaVerifier;
use std::time::Duration;

use crate::config::Config;

/// Builds the per-job verifier instance every verify-family stage
/// needs. Never shared across jobs or stored on the `Orchestrator`
/// (§5): each call here is a fresh rate-limiter window.
pub fn build_verifier(config: &Config) -> EngineResult<MailTesterNinjaVerifier> {
    let api_key = config
        .mailtester_api_key
        .as_deref()
        .ok_or_else(|| EngineError::InvalidConfig("MAILTESTER_NINJA_API_KEY is not configured".to_string()))?;

    MailTesterNinjaVerifier::new(
        &config.mailtester_base_url,
        api_key,
        Duration::from_secs(config.verifier_http_timeout_secs),
        Duration::from_secs(config.verifier_rate_limit_window_secs),
        config.verifier_rate_limit_max_requests,
        config.verifier_max_retries,
        Duration::from_secs(config.verifier_retry_base_secs),
    )
}

/// Strips scheme, `www.`, and any path/trailing slash, and lowercases
/// — the website -> domain normalisation used by the bulk-verify-leads
/// pre-pass (§4.6).
pub fn normalize_website(website: &str) -> String {
    let trimmed = website.trim().to_lowercase();
    let without_scheme = trimmed.splitn(2, "://").last().unwrap_or(&trimmed);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.split('/').next().unwrap_or(without_www).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_trailing_slash() {
        assert_eq!(normalize_website("https://www.Example.com/"), "example.com");
        assert_eq!(normalize_website("example.com"), "example.com");
        assert_eq!(normalize_website("HTTP://example.com/about/"), "example.com");
    }
}
