/// Generates and reverse-matches candidate local-parts for a person at
/// a domain (§4.2). Pure and stateless; the only state that varies
/// behaviour across calls is an optional already-known pattern, which
/// callers (the domain-learning stage) splice in themselves.
pub struct Permutator {
    max: usize,
}

const NAME_SUFFIXES: [&str; 5] = ["jr", "sr", "ii", "iii", "iv"];

impl Default for Permutator {
    fn default() -> Self {
        Self { max: 13 }
    }
}

impl Permutator {
    pub fn new(max: usize) -> Self {
        Self { max }
    }

    /// Produces up to `max` distinct candidate addresses, in priority
    /// order, for `first`/`last` at `domain`. Empty unless `first`,
    /// `last`, and `domain` all normalise to something — a lead with
    /// no last name has no patterns to try and fails without a probe
    /// (§4.6 step 2), rather than burning a vendor call on a bare
    /// first-name guess.
    pub fn generate(&self, first: &str, last: &str, domain: &str) -> Vec<String> {
        let first = normalize_name(first);
        let last = normalize_name(last);
        let domain = domain.trim();

        if first.is_empty() || last.is_empty() || domain.is_empty() {
            return Vec::new();
        }

        let mut out = Vec::new();
        let mut push = |local: String| {
            if !local.is_empty() && !out.contains(&local) {
                out.push(local);
            }
        };

        let f = first.chars().next().map(|c| c.to_string()).unwrap_or_default();
        let l = last.chars().next().map(|c| c.to_string()).unwrap_or_default();

        push(format!("{first}.{last}"));
        push(format!("{f}{last}"));
        push(format!("{f}.{last}"));
        push(first.clone());
        push(format!("{first}{last}"));
        push(format!("{first}_{last}"));
        push(format!("{first}{l}"));
        push(format!("{last}.{first}"));

        out.truncate(self.max);
        out.into_iter().map(|local| format!("{local}@{domain}")).collect()
    }

    /// Inverse of [`Self::generate`]: given a winning address, names
    /// the pattern (in `{first}.{last}` form) that would produce it,
    /// if any pattern in the fixed list does.
    pub fn detect_pattern(&self, email: &str, first: &str, last: &str) -> Option<String> {
        let local = email.split('@').next()?;
        let first = normalize_name(first);
        let last = normalize_name(last);
        let f = first.chars().next().map(|c| c.to_string()).unwrap_or_default();
        let l = last.chars().next().map(|c| c.to_string()).unwrap_or_default();

        let candidates: [(&str, String); 8] = [
            ("{first}.{last}", format!("{first}.{last}")),
            ("{f}{last}", format!("{f}{last}")),
            ("{f}.{last}", format!("{f}.{last}")),
            ("{first}", first.clone()),
            ("{first}{last}", format!("{first}{last}")),
            ("{first}_{last}", format!("{first}_{last}")),
            ("{first}{l}", format!("{first}{l}")),
            ("{last}.{first}", format!("{last}.{first}")),
        ];

        candidates
            .into_iter()
            .find(|(_, expansion)| expansion == local)
            .map(|(pattern, _)| pattern.to_string())
    }

    /// Expands a named pattern (as returned by [`Self::detect_pattern`])
    /// against a new first/last/domain — used by the domain-learning
    /// stage to try the already-known pattern first (§4.6 step 3).
    pub fn apply_pattern(&self, pattern: &str, first: &str, last: &str, domain: &str) -> Option<String> {
        let first = normalize_name(first);
        let last = normalize_name(last);
        let f = first.chars().next().map(|c| c.to_string()).unwrap_or_default();
        let l = last.chars().next().map(|c| c.to_string()).unwrap_or_default();

        let local = match pattern {
            "{first}.{last}" => format!("{first}.{last}"),
            "{f}{last}" => format!("{f}{last}"),
            "{f}.{last}" => format!("{f}.{last}"),
            "{first}" => first.clone(),
            "{first}{last}" => format!("{first}{last}"),
            "{first}_{last}" => format!("{first}_{last}"),
            "{first}{l}" => format!("{first}{l}"),
            "{last}.{first}" => format!("{last}.{first}"),
            _ => return None,
        };

        if local.is_empty() {
            None
        } else {
            Some(format!("{local}@{domain}"))
        }
    }
}

/// lowercase, strip name suffixes, map spaces to hyphens, drop
/// non-alphabetic characters except `-`, trim leading/trailing `-`.
fn normalize_name(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    let lower = lower.replace(' ', "-");

    let cleaned: String = lower
        .chars()
        .filter(|c| c.is_ascii_alphabetic() || *c == '-')
        .collect();

    let trimmed = cleaned.trim_matches('-');

    let parts: Vec<&str> = trimmed.split('-').filter(|p| !p.is_empty()).collect();
    let parts: Vec<&str> = match parts.as_slice() {
        [.., last] if NAME_SUFFIXES.contains(last) && parts.len() > 1 => {
            parts[..parts.len() - 1].to_vec()
        }
        _ => parts,
    };

    parts.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_the_canonical_pattern_order() {
        let p = Permutator::default();
        let emails = p.generate("Ada", "Lovelace", "example.com");
        assert_eq!(
            emails,
            vec![
                "ada.lovelace@example.com",
                "alovelace@example.com",
                "a.lovelace@example.com",
                "ada@example.com",
                "adalovelace@example.com",
                "ada_lovelace@example.com",
                "adal@example.com",
                "lovelace.ada@example.com",
            ]
        );
    }

    #[test]
    fn produces_no_duplicate_addresses() {
        let p = Permutator::default();
        let emails = p.generate("Al", "Al", "example.com");
        let unique: std::collections::HashSet<_> = emails.iter().collect();
        assert_eq!(unique.len(), emails.len());
    }

    #[test]
    fn empty_first_name_yields_nothing() {
        let p = Permutator::default();
        assert!(p.generate("", "Smith", "example.com").is_empty());
    }

    #[test]
    fn strips_generational_suffixes() {
        let p = Permutator::default();
        let emails = p.generate("John", "Smith Jr", "example.com");
        assert!(emails.contains(&"john.smith@example.com".to_string()));
    }

    #[test]
    fn detect_pattern_is_the_inverse_of_generate() {
        let p = Permutator::default();
        let emails = p.generate("Alan", "Turing", "example.com");
        for email in &emails {
            let pattern = p.detect_pattern(email, "Alan", "Turing");
            assert!(pattern.is_some(), "no pattern detected for {email}");
        }
    }

    #[test]
    fn apply_pattern_reuses_a_learned_pattern_for_a_new_person() {
        let p = Permutator::default();
        let email = p.apply_pattern("{first}.{last}", "Alan", "Turing", "example.com");
        assert_eq!(email, Some("alan.turing@example.com".to_string()));
    }

    #[test]
    fn missing_last_name_yields_nothing() {
        let p = Permutator::default();
        assert!(p.generate("Madonna", "", "example.com").is_empty());
    }

    #[test]
    fn missing_domain_yields_nothing() {
        let p = Permutator::default();
        assert!(p.generate("Ada", "Lovelace", "").is_empty());
    }
}
