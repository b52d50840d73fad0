//! Watchlist term matching for headline triage.
//!
//! Each active watchlist entity contributes its name plus its alias terms.
//! Matching is case-insensitive on word boundaries, scoped to the
//! headline's country unless the entity is global (no country).

use regex::Regex;
use tracing::warn;

use windfall_common::types::WatchlistEntity;

pub struct WatchlistMatcher {
    entries: Vec<CompiledEntity>,
}

struct CompiledEntity {
    name: String,
    country: Option<String>,
    patterns: Vec<Regex>,
}

impl WatchlistMatcher {
    pub fn new(entities: &[WatchlistEntity]) -> Self {
        let entries = entities
            .iter()
            .map(|entity| {
                let mut terms: Vec<&str> = vec![entity.name.as_str()];
                terms.extend(entity.terms.iter().map(String::as_str));
                let patterns = terms
                    .into_iter()
                    .filter(|t| !t.trim().is_empty())
                    .filter_map(|term| {
                        let pattern = format!(r"(?i)\b{}\b", regex::escape(term.trim()));
                        match Regex::new(&pattern) {
                            Ok(re) => Some(re),
                            Err(e) => {
                                warn!(term, error = %e, "Skipping unparseable watchlist term");
                                None
                            }
                        }
                    })
                    .collect();
                CompiledEntity {
                    name: entity.name.clone(),
                    country: entity.country.clone(),
                    patterns,
                }
            })
            .collect();
        Self { entries }
    }

    /// Names of watchlist entities whose terms match the headline, respecting
    /// country scope. Each entity is reported at most once.
    pub fn matches(&self, headline: &str, country: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| match &entry.country {
                Some(scope) => scope.eq_ignore_ascii_case(country),
                None => true,
            })
            .filter(|entry| entry.patterns.iter().any(|re| re.is_match(headline)))
            .map(|entry| entry.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windfall_common::types::EntityKind;

    fn entity(name: &str, terms: &[&str], country: Option<&str>) -> WatchlistEntity {
        WatchlistEntity {
            name: name.to_string(),
            kind: EntityKind::Individual,
            terms: terms.iter().map(|s| s.to_string()).collect(),
            country: country.map(|s| s.to_string()),
            hit_count: 0,
        }
    }

    #[test]
    fn matches_on_word_boundary_only() {
        let matcher = WatchlistMatcher::new(&[entity("Marta Voss", &["Voss"], None)]);
        assert_eq!(
            matcher.matches("Voss sells stake in logistics firm", "CH"),
            vec!["Marta Voss"]
        );
        // "Vossberg" must not match the "Voss" alias.
        assert!(matcher.matches("Vossberg AG expands", "CH").is_empty());
    }

    #[test]
    fn match_is_case_insensitive() {
        let matcher = WatchlistMatcher::new(&[entity("Marta Voss", &[], None)]);
        assert_eq!(
            matcher.matches("MARTA VOSS steps down as chair", "DE"),
            vec!["Marta Voss"]
        );
    }

    #[test]
    fn country_scope_limits_matching() {
        let matcher = WatchlistMatcher::new(&[entity("Huber Group", &[], Some("CH"))]);
        assert_eq!(
            matcher.matches("Huber Group sold to private buyer", "CH"),
            vec!["Huber Group"]
        );
        assert!(matcher
            .matches("Huber Group sold to private buyer", "DE")
            .is_empty());
    }

    #[test]
    fn global_entities_match_everywhere() {
        let matcher = WatchlistMatcher::new(&[entity("Atlas Capital", &[], None)]);
        assert!(!matcher.matches("Atlas Capital exits fund", "SG").is_empty());
        assert!(!matcher.matches("Atlas Capital exits fund", "US").is_empty());
    }

    #[test]
    fn entity_reported_once_for_multiple_term_hits() {
        let matcher =
            WatchlistMatcher::new(&[entity("Marta Voss", &["Voss", "M. Voss"], None)]);
        let hits = matcher.matches("M. Voss, known as Voss, sells company", "CH");
        assert_eq!(hits, vec!["Marta Voss"]);
    }
}
