use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Practice codes are compared trimmed and uppercased.
pub fn normalize_practice_id(raw: &str) -> String {
    clean_str(raw).to_uppercase()
}

/// Collapse whitespace runs to a single space.
pub fn collapse_whitespace(raw: &str) -> String {
    WHITESPACE.replace_all(clean_str(raw), " ").into_owned()
}

/// Turns the free-text supplier column into a stable name.
///
/// Compound values such as `EVERGREENLIFE/TPP` list a booking front-end next
/// to the clinical system; the front-end is dropped and the first remaining
/// part wins. Curated synonyms apply last. Casing is kept, so spellings that
/// differ in more than whitespace stay distinct unless a synonym maps them.
#[derive(Debug, Clone, Default)]
pub struct SupplierNormalizer {
    secondary: Vec<String>,
    synonyms: BTreeMap<String, String>,
}

impl SupplierNormalizer {
    pub fn new(secondary: &[String], synonyms: &BTreeMap<String, String>) -> Self {
        Self {
            secondary: secondary
                .iter()
                .map(|s| collapse_whitespace(s).to_uppercase())
                .collect(),
            synonyms: synonyms
                .iter()
                .map(|(from, to)| (collapse_whitespace(from).to_uppercase(), collapse_whitespace(to)))
                .collect(),
        }
    }

    /// `None` when nothing usable is left.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let name = collapse_whitespace(raw);
        let name = if name.contains('/') {
            self.primary_system(&name)
        } else {
            name
        };
        if name.is_empty() {
            return None;
        }
        match self.synonyms.get(&name.to_uppercase()) {
            Some(canonical) => Some(canonical.clone()),
            None => Some(name),
        }
    }

    fn primary_system(&self, compound: &str) -> String {
        let parts: Vec<&str> = compound
            .split('/')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        parts
            .iter()
            .find(|p| !self.secondary.contains(&p.to_uppercase()))
            .or_else(|| parts.first())
            .map(|p| p.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> SupplierNormalizer {
        let mut synonyms = BTreeMap::new();
        synonyms.insert("Emis  Web".to_string(), "EMIS".to_string());
        SupplierNormalizer::new(&["EVERGREENLIFE".to_string()], &synonyms)
    }

    #[test]
    fn cleans_practice_ids() {
        assert_eq!(normalize_practice_id("  a81001 "), "A81001");
        assert_eq!(normalize_practice_id("\"b82005\""), "B82005");
    }

    #[test]
    fn collapses_whitespace_but_keeps_case() {
        let n = normalizer();
        assert_eq!(n.normalize("  The   Phoenix\tPartnership ").as_deref(), Some("The Phoenix Partnership"));
        assert_eq!(n.normalize("Acme").as_deref(), Some("Acme"));
        assert_eq!(n.normalize("ACME").as_deref(), Some("ACME"));
    }

    #[test]
    fn compound_values_resolve_to_primary_system() {
        let n = normalizer();
        assert_eq!(n.normalize("EVERGREENLIFE/TPP").as_deref(), Some("TPP"));
        assert_eq!(n.normalize("EMIS / EVERGREENLIFE").as_deref(), Some("EMIS"));
        assert_eq!(n.normalize("MEDICUS/TPP").as_deref(), Some("MEDICUS"));
        assert_eq!(n.normalize("EVERGREENLIFE").as_deref(), Some("EVERGREENLIFE"));
        assert_eq!(n.normalize("evergreenlife/evergreenlife").as_deref(), Some("evergreenlife"));
    }

    #[test]
    fn synonyms_are_case_insensitive() {
        let n = normalizer();
        assert_eq!(n.normalize("emis web").as_deref(), Some("EMIS"));
    }

    #[test]
    fn blank_supplier_is_unusable() {
        let n = normalizer();
        assert_eq!(n.normalize("   "), None);
        assert_eq!(n.normalize(" / "), None);
    }
}
