//! Canonicalization of author and series spellings.
//!
//! Each raw name is resolved once per normalizer and cached:
//!
//! 1. blank input → "Unknown author" (authors) or `""` (series), no lookup
//! 2. cache hit (case-insensitive) → cached canonical form
//! 3. best cosine similarity against every known name, if an embedder is
//!    configured; accepted when strictly above `embedding` threshold
//! 4. best fuzzy ratio (normalized Levenshtein, 0–100, case-insensitive);
//!    accepted when at or above `fuzzy` threshold
//! 5. otherwise the input is a new canonical name and is added to the store
//!
//! Embedding failures (provider down, malformed output, mismatched
//! dimensions) are logged and fall through to fuzzy matching. A store that
//! cannot be read makes every name its own canonical form for that lookup.
//!
//! Embeddings are memoized by exact text for the lifetime of the normalizer,
//! so each known name is embedded at most once per run.

use crate::embedding::{Embedder, cosine_similarity};
use crate::known_names::{KnownNamesStore, NameKind};
use crate::types::UNKNOWN_AUTHOR;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const DEFAULT_EMBEDDING_THRESHOLD: f32 = 0.65;
pub const DEFAULT_FUZZY_THRESHOLD: u32 = 70;

/// Acceptance thresholds for the two matching stages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Cosine similarity must be strictly greater than this.
    pub embedding: f32,
    /// Fuzzy ratio must be at least this.
    pub fuzzy: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            embedding: DEFAULT_EMBEDDING_THRESHOLD,
            fuzzy: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Fuzzy similarity of two names in `0..=100`, ignoring case.
pub fn fuzzy_ratio(a: &str, b: &str) -> u32 {
    let score = strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase());
    (score * 100.0).round() as u32
}

/// Per-run name canonicalizer. Not shared between threads.
pub struct NameNormalizer {
    store: KnownNamesStore,
    embedder: Option<Box<dyn Embedder>>,
    thresholds: Thresholds,
    cache: HashMap<(NameKind, String), String>,
    embeddings: HashMap<String, Option<Vec<f32>>>,
}

impl NameNormalizer {
    /// Without an embedder only fuzzy matching is used.
    pub fn new(
        store: KnownNamesStore,
        embedder: Option<Box<dyn Embedder>>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            store,
            embedder,
            thresholds,
            cache: HashMap::new(),
            embeddings: HashMap::new(),
        }
    }

    pub fn store(&self) -> &KnownNamesStore {
        &self.store
    }

    pub fn normalize_author(&mut self, raw: &str) -> String {
        self.normalize(NameKind::Author, raw)
    }

    /// Empty string for a blank series.
    pub fn normalize_series(&mut self, raw: &str) -> String {
        self.normalize(NameKind::Series, raw)
    }

    pub fn normalize(&mut self, kind: NameKind, raw: &str) -> String {
        let input = raw.trim();
        if input.is_empty() {
            return match kind {
                NameKind::Author => UNKNOWN_AUTHOR.to_string(),
                NameKind::Series => String::new(),
            };
        }

        let key = (kind, input.to_lowercase());
        if let Some(canonical) = self.cache.get(&key) {
            return canonical.clone();
        }

        let canonical = self.resolve(kind, input);
        self.cache.insert(key, canonical.clone());
        canonical
    }

    fn resolve(&mut self, kind: NameKind, input: &str) -> String {
        let known = match self.store.load(kind) {
            Ok(known) => known,
            Err(e) => {
                warn!("Cannot read known {kind} names, keeping {input:?}: {e}");
                return input.to_string();
            }
        };

        if let Some((candidate, score)) = self.best_embedding_match(input, &known) {
            if score > self.thresholds.embedding {
                debug!(kind = %kind, input, candidate = %candidate, score, "embedding match");
                return candidate;
            }
        }

        if let Some((candidate, ratio)) = best_fuzzy_match(input, &known) {
            if ratio >= self.thresholds.fuzzy {
                debug!(kind = %kind, input, candidate = %candidate, ratio, "fuzzy match");
                return candidate;
            }
        }

        match self.store.add_if_absent(kind, input) {
            Ok(true) => info!("New {kind} name: {input}"),
            Ok(false) => {}
            Err(e) => warn!("Cannot record {kind} name {input:?}: {e}"),
        }
        input.to_string()
    }

    fn best_embedding_match(&mut self, input: &str, known: &[String]) -> Option<(String, f32)> {
        if self.embedder.is_none() || known.is_empty() {
            return None;
        }

        self.memoize(input);
        if !matches!(self.embeddings.get(input), Some(Some(_))) {
            return None;
        }
        for candidate in known {
            self.memoize(candidate);
        }

        let query = self.embeddings.get(input)?.as_ref()?;
        let mut best: Option<(&String, f32)> = None;
        for candidate in known {
            let Some(Some(vector)) = self.embeddings.get(candidate.as_str()) else {
                continue;
            };
            match cosine_similarity(query, vector) {
                Ok(score) => {
                    if best.is_none_or(|(_, top)| score > top) {
                        best = Some((candidate, score));
                    }
                }
                Err(e) => warn!("Skipping {candidate:?} for {input:?}: {e}"),
            }
        }
        best.map(|(candidate, score)| (candidate.clone(), score))
    }

    fn memoize(&mut self, text: &str) {
        if self.embeddings.contains_key(text) {
            return;
        }
        let Some(embedder) = self.embedder.as_ref() else {
            return;
        };
        let vector = match embedder.embed(text) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Embedding failed for {text:?}: {e}");
                None
            }
        };
        self.embeddings.insert(text.to_string(), vector);
    }
}

/// Highest-ratio known name; the first one wins ties.
fn best_fuzzy_match(input: &str, known: &[String]) -> Option<(String, u32)> {
    let mut best: Option<(&String, u32)> = None;
    for candidate in known {
        let ratio = fuzzy_ratio(input, candidate);
        if best.is_none_or(|(_, top)| ratio > top) {
            best = Some((candidate, ratio));
        }
    }
    best.map(|(candidate, ratio)| (candidate.clone(), ratio))
}
