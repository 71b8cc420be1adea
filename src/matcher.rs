//! Title matching against an artist's catalog.
//!
//! Strategies run in order and the first one that accepts a candidate wins:
//! 1. Substring: normalized containment in either direction (exact equality first)
//! 2. Similarity: best normalized Levenshtein score above the title threshold
//!
//! Matching is pure. Fetching, fallback search and writing happen in
//! [`crate::pipeline`].

use tracing::debug;

use crate::models::{AudioTrack, CatalogTitleEntry, FailureReason, MatchMethod, MatchResult};
use crate::normalize::normalize_title;
use crate::scoring::{meets, similarity, MatchConfig, SubstringTiePolicy, SCORE_EPSILON};

// ============================================================================
// Indexed Entries
// ============================================================================

/// Catalog entries with their normalized titles computed once.
pub struct IndexedEntries<'a> {
    entries: &'a [CatalogTitleEntry],
    keys: Vec<String>,
}

impl<'a> IndexedEntries<'a> {
    pub fn new(entries: &'a [CatalogTitleEntry]) -> Self {
        let keys = entries.iter().map(|e| normalize_title(&e.title)).collect();
        Self { entries, keys }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> &'a CatalogTitleEntry {
        &self.entries[index]
    }

    /// (index, normalized title) pairs, skipping entries that normalize to nothing.
    fn keyed(&self) -> impl Iterator<Item = (usize, &str)> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| !k.is_empty())
            .map(|(i, k)| (i, k.as_str()))
    }
}

/// An entry a strategy accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub index: usize,
    /// Absent for substring matches
    pub score: Option<f64>,
}

/// Highest-similarity entry for a normalized title (first on ties).
pub fn best_similarity(title_key: &str, entries: &IndexedEntries<'_>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, key) in entries.keyed() {
        let score = similarity(title_key, key);
        if best.map_or(true, |(_, b)| score > b + SCORE_EPSILON) {
            best = Some((i, score));
        }
    }
    best
}

// ============================================================================
// Strategies
// ============================================================================

/// One way of picking an entry for a normalized title.
pub trait MatchStrategy {
    fn method(&self) -> MatchMethod;

    /// Return the accepted candidate, if any. `title_key` is never empty.
    fn attempt(&self, title_key: &str, entries: &IndexedEntries<'_>) -> Option<Candidate>;
}

/// Containment match. Handles catalog titles that repeat a reading or add an
/// annotation the local file lacks, and the reverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringStrategy {
    pub tie: SubstringTiePolicy,
}

impl MatchStrategy for SubstringStrategy {
    fn method(&self) -> MatchMethod {
        MatchMethod::Substring
    }

    fn attempt(&self, title_key: &str, entries: &IndexedEntries<'_>) -> Option<Candidate> {
        if let Some((index, _)) = entries.keyed().find(|(_, key)| *key == title_key) {
            return Some(Candidate { index, score: None });
        }

        let mut best: Option<(usize, usize)> = None;
        for (index, key) in entries.keyed() {
            let contained_len = if title_key.contains(key) {
                key.chars().count()
            } else if key.contains(title_key) {
                title_key.chars().count()
            } else {
                continue;
            };

            match self.tie {
                SubstringTiePolicy::First => return Some(Candidate { index, score: None }),
                SubstringTiePolicy::Longest => {
                    if best.map_or(true, |(_, len)| contained_len > len) {
                        best = Some((index, contained_len));
                    }
                }
            }
        }
        best.map(|(index, _)| Candidate { index, score: None })
    }
}

/// Edit-distance match above a threshold.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityStrategy {
    pub threshold: f64,
}

impl MatchStrategy for SimilarityStrategy {
    fn method(&self) -> MatchMethod {
        MatchMethod::Similarity
    }

    fn attempt(&self, title_key: &str, entries: &IndexedEntries<'_>) -> Option<Candidate> {
        let (index, score) = best_similarity(title_key, entries)?;
        meets(score, self.threshold).then_some(Candidate {
            index,
            score: Some(score),
        })
    }
}

// ============================================================================
// Matcher
// ============================================================================

/// Ordered strategy list applied to each track.
pub struct Matcher {
    strategies: Vec<Box<dyn MatchStrategy>>,
}

impl Matcher {
    /// Substring, then similarity at the configured threshold.
    pub fn new(config: &MatchConfig) -> Self {
        Self::with_strategies(vec![
            Box::new(SubstringStrategy {
                tie: config.substring_tie,
            }),
            Box::new(SimilarityStrategy {
                threshold: config.title_threshold,
            }),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Match one track. Always returns a result; unmatched results carry the
    /// best rejected candidate.
    pub fn match_track(&self, track: &AudioTrack, entries: &IndexedEntries<'_>) -> MatchResult {
        let title = track.display_title();
        let title_key = normalize_title(&title);
        if title_key.is_empty() {
            return MatchResult::unmatched(track.clone(), FailureReason::EmptyTitle);
        }
        if entries.is_empty() {
            return MatchResult::unmatched(track.clone(), FailureReason::NoEntries);
        }

        for strategy in &self.strategies {
            if let Some(candidate) = strategy.attempt(&title_key, entries) {
                let entry = entries.entry(candidate.index);
                debug!(
                    "'{}' -> '{}' via {} ({:?})",
                    title,
                    entry.title,
                    strategy.method(),
                    candidate.score
                );
                return MatchResult::matched(track.clone(), entry.clone(), strategy.method(), candidate.score);
            }
        }

        let best = best_similarity(&title_key, entries);
        MatchResult::unmatched(
            track.clone(),
            FailureReason::NoMatch {
                title,
                best_candidate: best.map(|(i, _)| entries.entry(i).title.clone()),
                best_score: best.map(|(_, s)| s),
            },
        )
    }

    /// Match every track against the same entries. One result per track, in order.
    pub fn match_all(&self, tracks: &[AudioTrack], entries: &[CatalogTitleEntry]) -> Vec<MatchResult> {
        let indexed = IndexedEntries::new(entries);
        tracks.iter().map(|t| self.match_track(t, &indexed)).collect()
    }
}
