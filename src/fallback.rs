//! Title-search fallback for tracks the artist catalog could not match.
//!
//! Searches the whole catalog by title and scores each hit by title
//! similarity weighted by how well its credited artist agrees with ours.
//! This rescues songs listed under a collaboration or a differently-named
//! artist page ("輪舞-revolution-" under "奥井雅美 & 浦嶋りんこ").

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::Error;
use crate::models::{AudioTrack, FailureReason, MatchMethod, MatchResult, SearchHit};
use crate::normalize::{clean_title, longest_ideographic_run, normalize_title};
use crate::scoring::{
    artist_agreement, fallback_score, meets, similarity, ArtistAgreement, MatchConfig, SCORE_EPSILON,
};

/// Shortest ideographic run worth searching for on its own
const MIN_NARROWED_QUERY_CHARS: usize = 2;

/// Result of one fallback search.
#[derive(Debug, Clone)]
pub struct FallbackAttempt {
    pub result: MatchResult,
    /// Queries sent, in order. More than one means the query was narrowed.
    pub queries: Vec<String>,
}

impl FallbackAttempt {
    pub fn narrowed(&self) -> bool {
        self.queries.len() > 1
    }
}

pub struct TitleSearchFallback<'c, C: Catalog + ?Sized> {
    catalog: &'c C,
    threshold: f64,
    artist_threshold: f64,
}

impl<'c, C: Catalog + ?Sized> TitleSearchFallback<'c, C> {
    pub fn new(catalog: &'c C, config: &MatchConfig) -> Self {
        Self {
            catalog,
            threshold: config.fallback_threshold,
            artist_threshold: config.artist_threshold,
        }
    }

    /// Search for one track. The returned result is either a title-search
    /// match or an unmatched result explaining why not.
    pub fn search_track(&self, track: &AudioTrack, artist_hint: &str) -> FallbackAttempt {
        let title = track.display_title();
        let query = clean_title(&title);
        let title_key = normalize_title(&title);
        let mut queries = Vec::new();

        if title_key.is_empty() {
            return FallbackAttempt {
                result: MatchResult::unmatched(track.clone(), FailureReason::EmptyTitle),
                queries,
            };
        }

        queries.push(query.clone());
        let mut hits = match self.catalog.search_catalog(&query, artist_hint) {
            Ok(hits) => hits,
            Err(e) => return self.fetch_failure(track, e, queries),
        };

        if hits.is_empty() {
            if let Some(narrowed) = narrowed_query(&title_key) {
                debug!("No hits for '{}', retrying with '{}'", query, narrowed);
                queries.push(narrowed.clone());
                hits = match self.catalog.search_catalog(&narrowed, artist_hint) {
                    Ok(hits) => hits,
                    Err(e) => return self.fetch_failure(track, e, queries),
                };
            }
        }

        let result = match self.pick(&title_key, artist_hint, &hits) {
            Some((hit, score)) if meets(score, self.threshold) => match hit.clone().into_entry() {
                Ok(entry) => {
                    info!(
                        "Title search matched '{}' to '{}' by {} (score: {:.2})",
                        title, entry.title, entry.artist, score
                    );
                    MatchResult::matched(track.clone(), entry, MatchMethod::TitleSearch, Some(score))
                }
                Err(e) => {
                    warn!("Unusable search hit: {}", e);
                    unmatched(track, title, None)
                }
            },
            best => unmatched(track, title, best.map(|(hit, score)| (hit.title.clone(), score))),
        };

        FallbackAttempt { result, queries }
    }

    /// Best-scoring hit (first on ties). Hits whose artist disagrees are dropped.
    fn pick<'h>(&self, title_key: &str, artist_hint: &str, hits: &'h [SearchHit]) -> Option<(&'h SearchHit, f64)> {
        let mut best: Option<(&SearchHit, f64)> = None;
        for hit in hits {
            let agreement = if artist_hint.trim().is_empty() {
                // Nothing to compare against: title alone decides
                ArtistAgreement {
                    score: 1.0,
                    is_exact: false,
                }
            } else {
                artist_agreement(artist_hint, &hit.artist)
            };
            if !meets(agreement.score, self.artist_threshold) {
                debug!("Dropping hit '{}' by '{}': artist disagrees", hit.title, hit.artist);
                continue;
            }

            let score = fallback_score(similarity(title_key, &normalize_title(&hit.title)), agreement);
            debug!("Hit '{}' by '{}' scored {:.3}", hit.title, hit.artist, score);
            if best.map_or(true, |(_, b)| score > b + SCORE_EPSILON) {
                best = Some((hit, score));
            }
        }
        best
    }

    fn fetch_failure(&self, track: &AudioTrack, err: Error, queries: Vec<String>) -> FallbackAttempt {
        warn!("Title search failed for {}: {}", track.file_name, err);
        FallbackAttempt {
            result: MatchResult::unmatched(
                track.clone(),
                FailureReason::Fetch {
                    message: err.to_string(),
                },
            ),
            queries,
        }
    }

    /// Search for every track, in order.
    pub fn search(&self, unmatched_tracks: &[AudioTrack], artist_hint: &str) -> Vec<MatchResult> {
        unmatched_tracks
            .iter()
            .map(|t| self.search_track(t, artist_hint).result)
            .collect()
    }

    /// Re-run unmatched results through the title search. Matched results pass
    /// through untouched; an unsuccessful search keeps the original result.
    pub fn apply(&self, results: Vec<MatchResult>, artist_hint: &str) -> Vec<MatchResult> {
        results
            .into_iter()
            .map(|result| {
                if result.is_matched() {
                    return result;
                }
                let hint = result.track.artist.clone().unwrap_or_else(|| artist_hint.to_string());
                let attempt = self.search_track(&result.track, &hint);
                if attempt.result.is_matched() {
                    attempt.result
                } else {
                    result
                }
            })
            .collect()
    }
}

/// Kanji core of a title, when it is a strict part of the title.
fn narrowed_query(title_key: &str) -> Option<String> {
    let run = longest_ideographic_run(title_key)?;
    let run_len = run.chars().count();
    (run_len >= MIN_NARROWED_QUERY_CHARS && run_len < title_key.chars().count()).then_some(run)
}

fn unmatched(track: &AudioTrack, title: String, best: Option<(String, f64)>) -> MatchResult {
    MatchResult::unmatched(
        track.clone(),
        FailureReason::NoMatch {
            title,
            best_candidate: best.as_ref().map(|(t, _)| t.clone()),
            best_score: best.map(|(_, s)| s),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogTitleEntry;
    use crate::test_utils::FakeCatalog;

    const HINT: &str = "奥井雅美";

    fn track(title: &str) -> AudioTrack {
        AudioTrack::new(format!("/music/{}.mp3", title), Some(HINT.into()), Some(title.into())).unwrap()
    }

    fn revolution_hit() -> SearchHit {
        SearchHit {
            title: "輪舞～revolution～ Feat.浦嶋りんこ".into(),
            artist: "奥井雅美 & 浦嶋りんこ".into(),
            reference: "https://www.uta-net.com/song/44444/".into(),
        }
    }

    #[test]
    fn test_featuring_title_accepted_at_default_threshold() {
        let catalog = FakeCatalog::default().with_search("輪舞-revolution-", vec![revolution_hit()]);
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());

        let attempt = fallback.search_track(&track("輪舞－revolution－"), HINT);
        assert!(attempt.result.is_matched());
        assert_eq!(attempt.result.method(), Some(MatchMethod::TitleSearch));
        let score = attempt.result.score().unwrap();
        assert!((score - 12.0 / 22.0).abs() < 1e-9, "got {}", score);
        assert!(!attempt.narrowed());
    }

    #[test]
    fn test_featuring_title_rejected_at_strict_threshold() {
        let catalog = FakeCatalog::default().with_search("輪舞-revolution-", vec![revolution_hit()]);
        let strict = MatchConfig {
            fallback_threshold: 0.8,
            ..MatchConfig::default()
        };
        let attempt = TitleSearchFallback::new(&catalog, &strict).search_track(&track("輪舞－revolution－"), HINT);
        assert!(!attempt.result.is_matched());
        match attempt.result.failure() {
            Some(FailureReason::NoMatch { best_score, .. }) => assert!(best_score.unwrap() < 0.8),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_narrowed_query_retry() {
        let catalog = FakeCatalog::default().with_search("輪舞", vec![revolution_hit()]);
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());

        let attempt = fallback.search_track(&track("輪舞－revolution－"), HINT);
        assert!(attempt.narrowed());
        assert_eq!(attempt.queries, vec!["輪舞-revolution-".to_string(), "輪舞".to_string()]);
        assert!(attempt.result.is_matched());
    }

    #[test]
    fn test_no_narrowing_for_all_kanji_title() {
        let catalog = FakeCatalog::default();
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());
        let attempt = fallback.search_track(&track("残酷天使"), HINT);
        assert_eq!(attempt.queries.len(), 1);
        assert!(!attempt.result.is_matched());
    }

    #[test]
    fn test_disagreeing_artist_is_dropped() {
        let mut hit = revolution_hit();
        hit.artist = "B'z".into();
        let catalog = FakeCatalog::default().with_search("輪舞-revolution-", vec![hit]);
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());
        let attempt = fallback.search_track(&track("輪舞－revolution－"), HINT);
        assert!(!attempt.result.is_matched());
        assert!(matches!(
            attempt.result.failure(),
            Some(FailureReason::NoMatch { best_candidate: None, .. })
        ));
    }

    #[test]
    fn test_search_error_is_recorded_as_fetch_failure() {
        let catalog = FakeCatalog::default().failing_search();
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());
        let results = fallback.search(&[track("輪舞－revolution－")], HINT);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].failure(), Some(FailureReason::Fetch { .. })));
    }

    #[test]
    fn test_apply_never_downgrades_a_match() {
        let catalog = FakeCatalog::default().with_search("輪舞-revolution-", vec![revolution_hit()]);
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());

        let original = CatalogTitleEntry::new("輪舞-revolution-", "https://www.uta-net.com/song/1/", HINT).unwrap();
        let matched = MatchResult::matched(
            track("輪舞－revolution－"),
            original.clone(),
            MatchMethod::Similarity,
            Some(0.9),
        );
        let unmatched = MatchResult::unmatched(
            track("輪舞－revolution－"),
            FailureReason::NoMatch {
                title: "輪舞－revolution－".into(),
                best_candidate: None,
                best_score: None,
            },
        );

        let applied = fallback.apply(vec![matched, unmatched], HINT);
        assert_eq!(applied[0].entry(), Some(&original));
        assert_eq!(applied[0].method(), Some(MatchMethod::Similarity));
        assert_eq!(applied[1].method(), Some(MatchMethod::TitleSearch));
        assert_eq!(catalog.search_calls(), 1);
    }

    #[test]
    fn test_apply_keeps_original_failure_when_search_misses() {
        let catalog = FakeCatalog::default();
        let fallback = TitleSearchFallback::new(&catalog, &MatchConfig::default());
        let reason = FailureReason::NoMatch {
            title: "Unknown".into(),
            best_candidate: Some("Known".into()),
            best_score: Some(0.4),
        };
        let applied = fallback.apply(vec![MatchResult::unmatched(track("Unknown"), reason.clone())], HINT);
        assert_eq!(applied[0].failure(), Some(&reason));
    }

    #[test]
    fn test_narrowed_query_helper() {
        assert_eq!(narrowed_query("輪舞revolution"), Some("輪舞".to_string()));
        assert_eq!(narrowed_query("輪舞"), None);
        assert_eq!(narrowed_query("愛revolution"), None);
        assert_eq!(narrowed_query("revolution"), None);
    }
}
