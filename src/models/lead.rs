use serde::{Deserialize, Serialize};

/// One row of a bulk-verify-leads submission (§4.6): a name plus the
/// website the domain-learning stage resolves to `_domain`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadInput {
    pub first_name: String,
    pub last_name: String,
    pub website: String,
}

/// A lead the domain-learning stage confirmed deliverable. Shape
/// matches the `verified_leads` result payload and the bulk-verify-leads
/// CSV export columns (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedLead {
    pub first_name: String,
    pub last_name: String,
    pub website: String,
    pub email: String,
}

/// Per-email record emitted by the bulk-verify-emails stage (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerificationRecord {
    pub email: String,
    pub status: String,
    pub is_deliverable: Option<bool>,
    pub is_catch_all: Option<bool>,
    pub mx_found: Option<bool>,
    pub reason: Option<String>,
}
