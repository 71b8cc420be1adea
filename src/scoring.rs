//! Scoring functions for catalog matching.
//!
//! This module contains:
//! - the bounded title/artist similarity metric
//! - acceptance thresholds for each matching pass
//! - artist agreement scoring used by the title-search fallback

use serde::Serialize;
use strsim::normalized_levenshtein;

use crate::normalize::normalize_artist;

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum similarity for the artist-catalog similarity pass
pub const TITLE_ACCEPT_THRESHOLD: f64 = 0.8;

/// Minimum similarity for resolving a free-text artist name to a catalog artist
pub const ARTIST_ACCEPT_THRESHOLD: f64 = 0.5;

/// Minimum weighted score for the title-search fallback.
/// Lower than the primary pass: the fallback sees titles with featuring credits
/// and decorations the artist catalog strips ("輪舞～revolution～ Feat.浦嶋りんこ").
pub const FALLBACK_ACCEPT_THRESHOLD: f64 = 0.5;

/// Scores closer than this are treated as a tie
pub const SCORE_EPSILON: f64 = 1e-9;

// ============================================================================
// Configuration
// ============================================================================

/// How to choose among several entries that all pass the substring check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SubstringTiePolicy {
    /// Prefer the longest contained string; ties go to catalog order
    #[default]
    Longest,
    /// Take the first qualifying entry in catalog order
    First,
}

/// Thresholds and policies for one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchConfig {
    pub title_threshold: f64,
    pub artist_threshold: f64,
    pub fallback_threshold: f64,
    pub substring_tie: SubstringTiePolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            title_threshold: TITLE_ACCEPT_THRESHOLD,
            artist_threshold: ARTIST_ACCEPT_THRESHOLD,
            fallback_threshold: FALLBACK_ACCEPT_THRESHOLD,
            substring_tie: SubstringTiePolicy::Longest,
        }
    }
}

impl MatchConfig {
    /// Clamp every threshold into [0, 1].
    pub fn clamped(self) -> Self {
        Self {
            title_threshold: self.title_threshold.clamp(0.0, 1.0),
            artist_threshold: self.artist_threshold.clamp(0.0, 1.0),
            fallback_threshold: self.fallback_threshold.clamp(0.0, 1.0),
            ..self
        }
    }
}

// ============================================================================
// Similarity
// ============================================================================

/// Similarity between two normalized strings (0.0 to 1.0).
///
/// `1 - levenshtein / max_len`, counted in Unicode scalar values so a kanji
/// substitution costs the same as an ASCII one. Both empty → 1.0, one empty → 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    normalized_levenshtein(a, b).clamp(0.0, 1.0)
}

/// True when `score` reaches `threshold`, allowing [`SCORE_EPSILON`] of rounding below it.
pub fn meets(score: f64, threshold: f64) -> bool {
    score + SCORE_EPSILON >= threshold
}

/// Check whether two scores tie.
pub fn is_tie(a: f64, b: f64) -> bool {
    (a - b).abs() < SCORE_EPSILON
}

// ============================================================================
// Artist Agreement
// ============================================================================

/// Artist agreement result for a search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtistAgreement {
    pub score: f64,
    /// Names equal, or one contains the other, after normalization
    pub is_exact: bool,
}

/// Score a catalog artist credit against the artist we expect.
///
/// Equality or containment in either direction counts as full agreement:
/// "下川みくに" agrees with "下川みくに feat. 浦嶋りんこ". Otherwise the plain
/// similarity of the normalized names is used.
pub fn artist_agreement(expected: &str, credited: &str) -> ArtistAgreement {
    let expected_norm = normalize_artist(expected);
    let credited_norm = normalize_artist(credited);

    if expected_norm.is_empty() || credited_norm.is_empty() {
        return ArtistAgreement {
            score: 0.0,
            is_exact: false,
        };
    }

    if expected_norm == credited_norm
        || credited_norm.contains(&expected_norm)
        || expected_norm.contains(&credited_norm)
    {
        return ArtistAgreement {
            score: 1.0,
            is_exact: true,
        };
    }

    ArtistAgreement {
        score: similarity(&expected_norm, &credited_norm),
        is_exact: false,
    }
}

/// Weighted fallback score: title similarity scaled by artist agreement.
pub fn fallback_score(title_similarity: f64, agreement: ArtistAgreement) -> f64 {
    (title_similarity * agreement.score).clamp(0.0, 1.0)
}

// ============================================================================
// TESTS
// ============================================================================
