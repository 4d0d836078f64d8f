//! Divergence strategies
//!
//! A strategy turns an origin into a list of unrelated concepts. Strategies
//! are looked up by method name; unknown names fall back to `random`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::{debug, info, warn};

pub const DEFAULT_METHOD: &str = "random";

/// Used when no `concepts.json` is available.
const BUILTIN_WORDS: &[&str] = &[
    // nouns
    "lighthouse", "glacier", "compass", "orchard", "labyrinth", "tide", "lantern",
    "beehive", "anvil", "telescope", "mosaic", "riverbed", "scaffold", "seed",
    // verbs
    "dissolve", "braid", "ferment", "orbit", "prune", "echo", "migrate", "calibrate",
    // adjectives
    "brittle", "luminous", "hollow", "tangled", "dormant", "elastic", "feral",
    // abstract
    "entropy", "symmetry", "nostalgia", "threshold", "momentum", "paradox", "cascade",
    "horizon", "prism", "resonance",
    // phrases
    "a door left ajar", "the last train home", "borrowed time", "salt in the wound",
    // numbers
    "zero", "seven", "one in a million",
    // equations
    "E = mc^2", "a^2 + b^2 = c^2", "1 + 1 = 3",
];

/// Generates divergent concepts for an origin.
pub trait DivergenceStrategy: Send + Sync {
    /// Name for logs and listings.
    fn name(&self) -> String;

    fn generate(&self, origin: &str, count: usize) -> Vec<String>;
}

pub type SharedStrategy = Arc<dyn DivergenceStrategy>;

#[derive(Debug, Default, Deserialize)]
struct ConceptsFile {
    #[serde(default)]
    fallback_words: FallbackWords,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FallbackWords {
    nouns: Vec<String>,
    verbs: Vec<String>,
    adjectives: Vec<String>,
    #[serde(rename = "abstract")]
    abstract_: Vec<String>,
    phrases: Vec<String>,
    numbers: Vec<String>,
    equations: Vec<String>,
}

impl FallbackWords {
    fn into_words(self) -> Vec<String> {
        [
            self.nouns,
            self.verbs,
            self.adjectives,
            self.abstract_,
            self.phrases,
            self.numbers,
            self.equations,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Random words with no relation to the origin.
pub struct RandomStrategy {
    words: Vec<String>,
    source: &'static str,
    rng: Mutex<fastrand::Rng>,
}

impl RandomStrategy {
    pub fn builtin() -> Self {
        Self::with_words(BUILTIN_WORDS.iter().map(|w| w.to_string()).collect(), "builtin")
    }

    /// Words from a `concepts.json` file, or the built-in list when the file
    /// is missing, unreadable or empty.
    pub fn from_concepts_file(path: &Path) -> Self {
        match load_concepts(path) {
            Ok(words) if !words.is_empty() => {
                info!(path = %path.display(), words = words.len(), "Loaded divergence word list");
                Self::with_words(words, "concepts.json")
            }
            Ok(_) => {
                warn!(path = %path.display(), "concepts.json has no words, using built-in list");
                Self::builtin()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load concepts.json, using built-in list");
                Self::builtin()
            }
        }
    }

    fn with_words(words: Vec<String>, source: &'static str) -> Self {
        Self {
            words,
            source,
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Deterministic draws, for tests.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(fastrand::Rng::with_seed(seed));
        self
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }
}

impl DivergenceStrategy for RandomStrategy {
    fn name(&self) -> String {
        format!("random ({})", self.source)
    }

    /// Distinct words while the list lasts; repeats only once it is exhausted.
    fn generate(&self, origin: &str, count: usize) -> Vec<String> {
        debug!(count, origin = %origin.chars().take(20).collect::<String>(), "Drawing random concepts");
        if self.words.is_empty() {
            return Vec::new();
        }
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let mut order: Vec<usize> = (0..self.words.len()).collect();
        rng.shuffle(&mut order);

        let mut picks: Vec<usize> = order.into_iter().take(count).collect();
        while picks.len() < count {
            picks.push(rng.usize(..self.words.len()));
        }
        picks.into_iter().map(|i| self.words[i].clone()).collect()
    }
}

fn load_concepts(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let file: ConceptsFile = serde_json::from_str(&text)?;
    Ok(file.fallback_words.into_words())
}

/// Strategies keyed by method name.
pub struct StrategyRegistry {
    strategies: HashMap<String, SharedStrategy>,
}

impl StrategyRegistry {
    /// The `random` strategy, reading `concepts_path` when given.
    pub fn with_defaults(concepts_path: Option<&Path>) -> Self {
        let random = match concepts_path {
            Some(path) => RandomStrategy::from_concepts_file(path),
            None => RandomStrategy::builtin(),
        };
        let mut registry = Self {
            strategies: HashMap::new(),
        };
        registry.register(DEFAULT_METHOD, Arc::new(random));
        registry
    }

    pub fn register(&mut self, method: impl Into<String>, strategy: SharedStrategy) {
        self.strategies.insert(method.into(), strategy);
    }

    pub fn contains(&self, method: &str) -> bool {
        self.strategies.contains_key(method)
    }

    /// The strategy for `method`, falling back to `random`.
    pub fn get(&self, method: &str) -> Option<SharedStrategy> {
        match self.strategies.get(method) {
            Some(strategy) => Some(strategy.clone()),
            None => {
                warn!(method, "Unknown divergence method, using random");
                self.strategies.get(DEFAULT_METHOD).cloned()
            }
        }
    }

    pub fn generate(&self, origin: &str, method: &str, count: usize) -> Vec<String> {
        let Some(strategy) = self.get(method) else {
            return Vec::new();
        };
        info!(count, strategy = %strategy.name(), "Generating divergent concepts");
        strategy.generate(origin, count)
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut methods: Vec<_> = self.strategies.keys().collect();
        methods.sort();
        f.debug_struct("StrategyRegistry")
            .field("methods", &methods)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    struct Fixed;

    impl DivergenceStrategy for Fixed {
        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn generate(&self, _origin: &str, count: usize) -> Vec<String> {
            vec!["fixed".to_string(); count]
        }
    }

    #[test]
    fn test_random_draws_distinct_words() {
        let strategy = RandomStrategy::builtin().seeded(7);
        let words = strategy.generate("origin", 10);
        assert_eq!(words.len(), 10);
        let unique: HashSet<_> = words.iter().collect();
        assert_eq!(unique.len(), 10);
    }

    #[test]
    fn test_random_repeats_when_exhausted() {
        let strategy = RandomStrategy::with_words(vec!["a".into(), "b".into()], "test");
        let words = strategy.generate("origin", 5);
        assert_eq!(words.len(), 5);
        assert!(words.iter().all(|w| w == "a" || w == "b"));
    }

    #[test]
    fn test_concepts_file_categories() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"fallback_words": {{"nouns": ["kite"], "equations": ["x = y"], "colors": ["red"]}}}}"#
        )
        .unwrap();
        let strategy = RandomStrategy::from_concepts_file(file.path());
        assert_eq!(strategy.word_count(), 2);
        assert_eq!(strategy.name(), "random (concepts.json)");
    }

    #[test]
    fn test_missing_concepts_file_uses_builtin() {
        let strategy = RandomStrategy::from_concepts_file(Path::new("/nonexistent/concepts.json"));
        assert_eq!(strategy.word_count(), BUILTIN_WORDS.len());
    }

    #[test]
    fn test_registry_fallback() {
        let mut registry = StrategyRegistry::with_defaults(None);
        registry.register("fixed", Arc::new(Fixed));
        assert_eq!(registry.generate("o", "fixed", 2), vec!["fixed", "fixed"]);
        assert!(!registry.contains("semantic"));
        assert_eq!(registry.generate("o", "semantic", 3).len(), 3);
    }
}
