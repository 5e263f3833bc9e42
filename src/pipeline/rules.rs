//! Rule catalog: the fixed set of (misspelling → correction) pairs.
//!
//! Built once at startup and never mutated. The built-in catalog carries
//! the Spanish rules; an operator may replace it with a JSON file holding
//! an array of rules.

use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::error::ConfigError;
use crate::pipeline::types::Rule;

/// Immutable, non-empty rule set.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
}

impl RuleCatalog {
    /// Create a catalog. Fails if `rules` is empty or a rule has a blank term.
    pub fn new(rules: Vec<Rule>) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "rules".into(),
                message: "rule catalog must not be empty".into(),
            });
        }
        if let Some(bad) = rules
            .iter()
            .find(|r| r.search_term.trim().is_empty() || r.language.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: "rules".into(),
                message: format!("rule with blank search term or language: {bad:?}"),
            });
        }
        Ok(Self { rules })
    }

    /// The built-in Spanish rules.
    pub fn default_rules() -> Self {
        Self {
            rules: vec![
                Rule::new(
                    "tí",
                    "ti nunca lleva tilde → http://buscon.rae.es/dpd/?key=ti&origen=REDPD",
                    "es",
                ),
                Rule::new(
                    "cuidate",
                    "cuídate es esdrújula, por lo que siempre lleva tilde → \
                     http://buscon.rae.es/dpd/?key=tilde#113",
                    "es",
                ),
            ],
        }
    }

    /// Load a catalog from a JSON array of rules.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let rules: Vec<Rule> = serde_json::from_str(&raw).map_err(|e| {
            ConfigError::ParseError(format!("rules file {}: {e}", path.display()))
        })?;
        let catalog = Self::new(rules)?;
        info!(path = %path.display(), count = catalog.len(), "Loaded rule catalog");
        Ok(catalog)
    }

    /// All rules in declaration order.
    pub fn all_rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Pick one rule uniformly at random.
    pub fn pick_random<R: Rng + ?Sized>(&self, rng: &mut R) -> &Rule {
        // Non-empty by construction.
        let idx = rng.gen_range(0..self.rules.len());
        &self.rules[idx]
    }

    /// Whether a rule with this term and language exists.
    pub fn contains(&self, search_term: &str, language: &str) -> bool {
        self.rules
            .iter()
            .any(|r| r.search_term == search_term && r.language == language)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Write;

    #[test]
    fn default_rules_are_spanish_and_non_empty() {
        let catalog = RuleCatalog::default_rules();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.all_rules().iter().all(|r| r.language == "es"));
        assert!(catalog.contains("tí", "es"));
        assert!(catalog.contains("cuidate", "es"));
        assert!(!catalog.contains("cuidate", "en"));
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(matches!(
            RuleCatalog::new(vec![]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn blank_term_rejected() {
        let result = RuleCatalog::new(vec![Rule::new("  ", "msg", "es")]);
        assert!(result.is_err());
    }

    #[test]
    fn pick_random_covers_every_rule() {
        let catalog = RuleCatalog::new(vec![
            Rule::new("a", "A", "es"),
            Rule::new("b", "B", "es"),
            Rule::new("c", "C", "es"),
        ])
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let mut counts = [0usize; 3];
        for _ in 0..3_000 {
            let rule = catalog.pick_random(&mut rng);
            let idx = catalog
                .all_rules()
                .iter()
                .position(|r| r == rule)
                .unwrap();
            counts[idx] += 1;
        }
        // Uniform: each around 1000.
        for count in counts {
            assert!((850..=1150).contains(&count), "skewed pick: {counts:?}");
        }
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"search_term": "haber", "reply_message": "a ver", "language": "es"}}]"#
        )
        .unwrap();

        let catalog = RuleCatalog::from_json_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.all_rules()[0].reply_message, "a ver");
    }

    #[test]
    fn malformed_json_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RuleCatalog::from_json_file(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
