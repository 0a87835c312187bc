use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

const NOISE_WORDS: &[&str] = &[
    "inc", "corp", "llc", "ltd", "company", "the", "and", "&", "technologies", "solutions",
    "services", "group", "holdings", "plc", "consulting", "partners", "labs",
];

const SUFFIXES: &[&str] = &[".com", ".io", ".co", ".net", ".org", ".ai", ".dev"];

/// Company-name -> domain heuristic backed by MX probing (§4.3).
///
/// The cache is per-process, read-mostly, and deliberately racy on
/// concurrent writes to the same key (MX answers are idempotent so a
/// write-wins race costs nothing — §5).
pub struct DomainFinder {
    resolver: TokioAsyncResolver,
    query_timeout: Duration,
    total_timeout: Duration,
    cache: Mutex<HashMap<String, Option<String>>>,
}

impl DomainFinder {
    pub fn new(query_timeout: Duration, total_timeout: Duration) -> Result<Self, crate::error::EngineError> {
        let mut opts = ResolverOpts::default();
        opts.timeout = query_timeout;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        Ok(Self {
            resolver,
            query_timeout,
            total_timeout,
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub async fn find_domain(&self, company_name: &str) -> Option<String> {
        let key = company_name.trim().to_lowercase();
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return cached.clone();
        }

        let result = self.resolve_uncached(&key).await;
        self.cache.lock().unwrap().insert(key, result.clone());
        result
    }

    pub fn cache_stats(&self) -> (usize, usize) {
        let cache = self.cache.lock().unwrap();
        let hits = cache.values().filter(|v| v.is_some()).count();
        let misses = cache.len() - hits;
        (hits, misses)
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    async fn resolve_uncached(&self, company_name: &str) -> Option<String> {
        let bases = candidate_bases(company_name);
        let budget = tokio::time::Instant::now() + self.total_timeout;

        for base in bases {
            for suffix in SUFFIXES {
                if tokio::time::Instant::now() >= budget {
                    return None;
                }
                let domain = format!("{base}{suffix}");
                if self.has_mx(&domain).await {
                    return Some(domain);
                }
            }
        }
        None
    }

    async fn has_mx(&self, domain: &str) -> bool {
        let lookup = tokio::time::timeout(self.query_timeout, self.resolver.mx_lookup(domain));
        matches!(lookup.await, Ok(Ok(records)) if records.iter().next().is_some())
    }
}

/// Lowercase, strip punctuation, drop noise words, then form up to
/// three candidate bases: all survivors concatenated, the first
/// survivor alone, and the first two concatenated. Bases under 3
/// characters are rejected outright.
fn candidate_bases(company_name: &str) -> Vec<String> {
    let lower = company_name.to_lowercase();
    let stripped: String = lower
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();

    let survivors: Vec<&str> = stripped
        .split_whitespace()
        .filter(|w| !NOISE_WORDS.contains(w))
        .collect();

    if survivors.is_empty() {
        return Vec::new();
    }

    let mut bases = Vec::new();
    let all = survivors.concat();
    bases.push(all);
    bases.push(survivors[0].to_string());
    if survivors.len() > 1 {
        bases.push(format!("{}{}", survivors[0], survivors[1]));
    }

    let mut seen = std::collections::HashSet::new();
    bases
        .into_iter()
        .filter(|b| b.len() >= 3)
        .filter(|b| seen.insert(b.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_noise_words_and_forms_expected_bases() {
        let bases = candidate_bases("Acme Technologies, Inc.");
        assert!(bases.contains(&"acme".to_string()));
    }

    #[test]
    fn orders_bases_all_concat_then_first_then_first_two() {
        let bases = candidate_bases("Blue River Labs");
        assert_eq!(bases, vec!["blueriverlabs".to_string(), "blue".to_string(), "blueriver".to_string()]);
    }

    #[test]
    fn rejects_bases_shorter_than_three_characters() {
        let bases = candidate_bases("AI & Co");
        assert!(bases.iter().all(|b| b.len() >= 3));
    }

    #[test]
    fn empty_after_noise_stripping_yields_no_bases() {
        let bases = candidate_bases("The Inc LLC");
        assert!(bases.is_empty());
    }
}
