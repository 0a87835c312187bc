use serde::{Deserialize, Serialize};

/// Verdict returned by the rate-limited verifier client (§4.1). Never
/// an error value — a vendor call that fails transiently still
/// produces a `VerificationResult` with `status = Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Valid,
    Invalid,
    CatchAll,
    Unknown,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Valid => "valid",
            VerificationStatus::Invalid => "invalid",
            VerificationStatus::CatchAll => "catch_all",
            VerificationStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub email: String,
    pub status: VerificationStatus,
    pub is_deliverable: Option<bool>,
    pub is_catch_all: Option<bool>,
    pub is_disposable: bool,
    pub mx_found: Option<bool>,
    pub reason: Option<String>,
    pub is_rate_limited: bool,
}

impl VerificationResult {
    pub fn new(email: impl Into<String>, status: VerificationStatus) -> Self {
        Self {
            email: email.into(),
            status,
            is_deliverable: None,
            is_catch_all: None,
            is_disposable: false,
            mx_found: None,
            reason: None,
            is_rate_limited: false,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_deliverable(mut self, deliverable: bool) -> Self {
        self.is_deliverable = Some(deliverable);
        self
    }

    pub fn with_catch_all(mut self, catch_all: bool) -> Self {
        self.is_catch_all = Some(catch_all);
        self
    }

    pub fn with_mx_found(mut self, mx_found: bool) -> Self {
        self.mx_found = Some(mx_found);
        self
    }

    pub fn rate_limited(mut self) -> Self {
        self.is_rate_limited = true;
        self
    }

    /// True when the reason names a missing-MX verdict, the signal
    /// the domain-learning stage uses to retire a domain for the rest
    /// of the run (§4.6 step 5).
    pub fn is_no_mx(&self) -> bool {
        self.reason
            .as_deref()
            .map(|r| r.to_lowercase().contains("no mx"))
            .unwrap_or(false)
    }
}
