use crate::models::profile::EnrichedMember;
use crate::models::verification::VerificationStatus;
use crate::services::permutator::Permutator;
use crate::services::verifier::MailTesterNinjaVerifier;

/// Finds and verifies an email for an already-enriched profile
/// (§4.9), used by the scrape-profiles stage.
///
/// Unlike the domain-learning batch verifier (§4.6), this accepts
/// `catch_all` as "found" — the scrape stage has no domain-level
/// context to fall back on, so a catch-all hit is the best signal
/// available. This divergence is deliberate (§9 open question); do
/// not unify it with §4.6's stricter policy.
pub struct EmailFinder<'a> {
    permutator: &'a Permutator,
    verifier: &'a MailTesterNinjaVerifier,
    max_permutations: usize,
}

impl<'a> EmailFinder<'a> {
    pub fn new(permutator: &'a Permutator, verifier: &'a MailTesterNinjaVerifier) -> Self {
        Self {
            permutator,
            verifier,
            max_permutations: 8,
        }
    }

    pub async fn find_email_for_profile(&self, profile: &mut EnrichedMember) {
        let (Some(domain), Some(first)) = (profile.company_domain.clone(), profile.first_name.clone())
        else {
            return;
        };

        let last = profile.last_name.clone().unwrap_or_default();
        let mut candidates = self.permutator.generate(&first, &last, &domain);
        candidates.truncate(self.max_permutations);

        for email in candidates {
            let result = self.verifier.verify(&email).await;
            match result.status {
                VerificationStatus::Valid => {
                    profile.email = Some(email);
                    profile.email_verified = true;
                    return;
                }
                VerificationStatus::CatchAll => {
                    profile.email = Some(email);
                    profile.email_verified = false;
                    return;
                }
                _ => continue,
            }
        }
    }
}
