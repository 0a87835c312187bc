use std::time::Duration;

use serde::Deserialize;

use crate::error::EngineError;
use crate::models::verification::{VerificationResult, VerificationStatus};
use crate::services::rate_limiter::SlidingWindowLimiter;

#[derive(Debug, Deserialize)]
struct VendorResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
    /// The vendor sends the MX hostname as a string (e.g.
    /// `"mx1.example.com"`), not a boolean — an empty string or the
    /// literal `"null"` means no MX record was found.
    #[serde(default)]
    mx: Option<String>,
}

impl VendorResponse {
    fn mx_found(&self) -> bool {
        self.mx.as_deref().map_or(false, |m| !m.is_empty() && m != "null")
    }
}

/// Rate-limited client for a single mail-verification vendor (§4.1).
///
/// Wraps a [`SlidingWindowLimiter`] and a 429-aware retry policy
/// around the vendor's response decoder. Safe for sequential use per
/// instance; callers must not share one instance across parallel
/// tasks — the limiter's shared state assumes a single in-flight
/// caller stream (`&self` methods take `&self` only because the
/// limiter internally synchronises; see §5 on one-instance-per-job).
pub struct MailTesterNinjaVerifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: SlidingWindowLimiter,
    max_retries: u32,
    retry_base: Duration,
}

impl MailTesterNinjaVerifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http_timeout: Duration,
        rate_limit_window: Duration,
        rate_limit_max_requests: usize,
        max_retries: u32,
        retry_base: Duration,
    ) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder().timeout(http_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            limiter: SlidingWindowLimiter::new(rate_limit_window, rate_limit_max_requests),
            max_retries,
            retry_base,
        })
    }

    pub async fn verify(&self, email: &str) -> VerificationResult {
        let mut attempt = 0u32;
        loop {
            self.limiter.acquire().await;

            let response = self
                .client
                .get(&self.base_url)
                .query(&[("email", email), ("key", self.api_key.as_str())])
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().as_u16() == 429 => {
                    if attempt < self.max_retries {
                        let delay = self.retry_base * 2u32.pow(attempt);
                        tracing::warn!(email, attempt, ?delay, "vendor rate limited us, backing off");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return VerificationResult::new(email, VerificationStatus::Unknown)
                        .with_reason("rate limit exceeded")
                        .rate_limited();
                }
                Ok(resp) if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 => {
                    return VerificationResult::new(email, VerificationStatus::Unknown)
                        .with_reason("authentication failed");
                }
                Ok(resp) if resp.status().is_success() => {
                    return match resp.json::<VendorResponse>().await {
                        Ok(payload) => decode(email, &payload),
                        Err(e) => {
                            tracing::warn!(email, error = %e, "malformed vendor response");
                            VerificationResult::new(email, VerificationStatus::Unknown)
                                .with_reason("malformed vendor response")
                        }
                    };
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    return VerificationResult::new(email, VerificationStatus::Unknown)
                        .with_reason(format!("vendor returned status {status}"));
                }
                Err(e) if e.is_timeout() => {
                    return VerificationResult::new(email, VerificationStatus::Invalid)
                        .with_reason("timed out");
                }
                Err(e) => {
                    tracing::warn!(email, error = %e, "transport error contacting verifier");
                    return VerificationResult::new(email, VerificationStatus::Unknown)
                        .with_reason(e.to_string());
                }
            }
        }
    }

    pub async fn close(&self) {}
}

/// Implements the response-decoding table of §4.1, in row order —
/// later rows only apply when no earlier, more specific row matched.
fn decode(email: &str, payload: &VendorResponse) -> VerificationResult {
    let code = payload.code.to_lowercase();
    let message = payload.message.to_lowercase();
    let mx = payload.mx_found();

    if code == "ok" && message == "accepted" {
        return VerificationResult::new(email, VerificationStatus::Valid)
            .with_deliverable(true)
            .with_catch_all(false)
            .with_mx_found(true);
    }

    if code == "ok" && message == "limited" {
        return VerificationResult::new(email, VerificationStatus::Valid)
            .with_deliverable(true)
            .with_catch_all(false)
            .with_mx_found(true)
            .with_reason("inbox rate-limited");
    }

    if message.contains("catch-all") {
        return VerificationResult::new(email, VerificationStatus::CatchAll)
            .with_deliverable(true)
            .with_catch_all(true)
            .with_mx_found(true)
            .with_reason("catch-all domain");
    }

    if code == "mb" {
        return VerificationResult::new(email, VerificationStatus::CatchAll)
            .with_deliverable(true)
            .with_catch_all(true)
            .with_mx_found(true)
            .with_reason("server will not confirm");
    }

    if code == "ko" || message.contains("rejected") {
        return VerificationResult::new(email, VerificationStatus::Invalid)
            .with_deliverable(false)
            .with_mx_found(mx)
            .with_reason("rejected");
    }

    if message.contains("no mx") {
        return VerificationResult::new(email, VerificationStatus::Invalid)
            .with_deliverable(false)
            .with_mx_found(false)
            .with_reason("no MX records");
    }

    if message.contains("mx error") {
        return VerificationResult::new(email, VerificationStatus::Unknown)
            .with_reason("cannot reach mail server");
    }

    if message.contains("timeout") {
        return VerificationResult::new(email, VerificationStatus::Unknown)
            .with_reason("mail server timeout");
    }

    if message.contains("spam block") {
        return VerificationResult::new(email, VerificationStatus::Unknown)
            .with_reason("blocked by spam filter");
    }

    if code == "ok" {
        return VerificationResult::new(email, VerificationStatus::Valid)
            .with_deliverable(true)
            .with_catch_all(false)
            .with_mx_found(true)
            .with_reason(payload.message.clone());
    }

    if !mx {
        return VerificationResult::new(email, VerificationStatus::Invalid)
            .with_deliverable(false)
            .with_mx_found(false);
    }

    VerificationResult::new(email, VerificationStatus::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vendor(code: &str, message: &str, mx: bool) -> VendorResponse {
        VendorResponse {
            code: code.to_string(),
            message: message.to_string(),
            mx: if mx { Some("mx1.example.com".to_string()) } else { None },
        }
    }

    #[test]
    fn deserializes_a_live_vendor_payload_with_string_mx_field() {
        let payload: VendorResponse = serde_json::from_str(
            r#"{"email":"a@b.com","user":"a","domain":"b.com","mx":"mx1.b.com","code":"ok","message":"accepted","connections":1}"#,
        )
        .unwrap();
        assert!(payload.mx_found());
        assert_eq!(decode("a@b.com", &payload).status, VerificationStatus::Valid);
    }

    #[test]
    fn empty_string_mx_is_treated_as_no_mx() {
        let payload: VendorResponse = serde_json::from_str(r#"{"code":"ko","message":"no mx","mx":""}"#).unwrap();
        assert!(!payload.mx_found());
    }

    #[test]
    fn ok_accepted_decodes_to_valid() {
        let result = decode("a@b.com", &vendor("ok", "accepted", true));
        assert_eq!(result.status, VerificationStatus::Valid);
        assert_eq!(result.is_deliverable, Some(true));
        assert_eq!(result.is_catch_all, Some(false));
    }

    #[test]
    fn catch_all_message_wins_regardless_of_code() {
        let result = decode("a@b.com", &vendor("ok", "Catch-All", true));
        assert_eq!(result.status, VerificationStatus::CatchAll);
        assert_eq!(result.reason.as_deref(), Some("catch-all domain"));
    }

    #[test]
    fn mb_code_is_treated_as_catch_all() {
        let result = decode("a@b.com", &vendor("mb", "whatever", true));
        assert_eq!(result.status, VerificationStatus::CatchAll);
        assert_eq!(result.reason.as_deref(), Some("server will not confirm"));
    }

    #[test]
    fn ko_code_decodes_to_invalid_rejected() {
        let result = decode("a@b.com", &vendor("ko", "mailbox does not exist", true));
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert_eq!(result.reason.as_deref(), Some("rejected"));
    }

    #[test]
    fn no_mx_message_decodes_to_invalid_with_mx_absent() {
        let result = decode("a@b.com", &vendor("", "no mx records found", false));
        assert_eq!(result.status, VerificationStatus::Invalid);
        assert_eq!(result.mx_found, Some(false));
        assert!(result.is_no_mx());
    }

    #[test]
    fn mx_error_decodes_to_unknown() {
        let result = decode("a@b.com", &vendor("ok", "mx error: connection refused", true));
        assert_eq!(result.status, VerificationStatus::Unknown);
    }

    #[test]
    fn unrecognized_ok_message_passes_through_as_valid() {
        let result = decode("a@b.com", &vendor("ok", "greylisted", true));
        assert_eq!(result.status, VerificationStatus::Valid);
        assert_eq!(result.reason.as_deref(), Some("greylisted"));
    }

    #[test]
    fn unknown_code_without_mx_falls_back_to_invalid() {
        let result = decode("a@b.com", &vendor("zz", "nonsense", false));
        assert_eq!(result.status, VerificationStatus::Invalid);
    }

    #[test]
    fn unknown_code_with_mx_falls_back_to_unknown() {
        let result = decode("a@b.com", &vendor("zz", "nonsense", true));
        assert_eq!(result.status, VerificationStatus::Unknown);
    }
}
