//! Artist resolution: free-text artist name → catalog artist page.

use tracing::debug;

use crate::error::{Error, Result, ScoredName};
use crate::models::CatalogArtist;
use crate::normalize::{canonical_name, normalize_artist};
use crate::scoring::{is_tie, meets, similarity, ARTIST_ACCEPT_THRESHOLD};

/// The chosen artist and how it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistResolution {
    pub artist: CatalogArtist,
    pub score: f64,
    /// Display names were identical
    pub exact: bool,
}

/// Picks one catalog artist for a query or explains why it can't.
#[derive(Debug, Clone, Copy)]
pub struct ArtistResolver {
    threshold: f64,
}

impl Default for ArtistResolver {
    fn default() -> Self {
        Self::new(ARTIST_ACCEPT_THRESHOLD)
    }
}

impl ArtistResolver {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Resolve `query` against `candidates`.
    ///
    /// 1. A single candidate whose display name equals the query wins outright.
    ///    Several equal display names are ambiguous.
    /// 2. Otherwise the highest normalized-name similarity wins if it reaches
    ///    the threshold and nobody ties with it.
    pub fn resolve(&self, query: &str, candidates: &[CatalogArtist]) -> Result<ArtistResolution> {
        let query_name = canonical_name(query);

        let exact: Vec<&CatalogArtist> = candidates
            .iter()
            .filter(|c| canonical_name(&c.name) == query_name)
            .collect();
        match exact.as_slice() {
            [only] => {
                return Ok(ArtistResolution {
                    artist: (*only).clone(),
                    score: 1.0,
                    exact: true,
                })
            }
            [] => {}
            several => {
                return Err(Error::Ambiguous {
                    query: query.to_string(),
                    candidates: several.iter().map(|c| ScoredName::new(c.to_string(), 1.0)).collect(),
                })
            }
        }

        let query_norm = normalize_artist(query);
        let scored: Vec<(&CatalogArtist, f64)> = candidates
            .iter()
            .map(|c| (c, similarity(&query_norm, &normalize_artist(&c.name))))
            .collect();

        for (candidate, score) in &scored {
            debug!("Artist candidate '{}' similarity {:.2}", candidate.name, score);
        }

        let best = scored
            .iter()
            .map(|(_, s)| *s)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.max(s))));

        let best = match best {
            Some(b) if !query_norm.is_empty() && meets(b, self.threshold) => b,
            _ => {
                let closest = scored
                    .iter()
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(c, s)| ScoredName::new(c.name.clone(), *s));
                return Err(Error::NotFound {
                    query: query.to_string(),
                    best: closest,
                });
            }
        };

        let tied: Vec<&(&CatalogArtist, f64)> = scored.iter().filter(|(_, s)| is_tie(*s, best)).collect();
        if tied.len() > 1 {
            return Err(Error::Ambiguous {
                query: query.to_string(),
                candidates: tied.iter().map(|(c, s)| ScoredName::new(c.to_string(), *s)).collect(),
            });
        }

        let (artist, score) = tied[0];
        Ok(ArtistResolution {
            artist: (*artist).clone(),
            score: *score,
            exact: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(name: &str, id: u32, count: u32) -> CatalogArtist {
        CatalogArtist::new(name, format!("https://www.uta-net.com/artist/{}/", id), count).unwrap()
    }

    #[test]
    fn test_exact_match_wins() {
        let candidates = vec![artist("下川みくに", 6234, 110)];
        let resolution = ArtistResolver::default().resolve("下川みくに", &candidates).unwrap();
        assert!(resolution.exact);
        assert_eq!(resolution.score, 1.0);
        assert_eq!(resolution.artist.entry_count, 110);
    }

    #[test]
    fn test_exact_beats_closer_lookalikes() {
        let candidates = vec![
            artist("ZARD tribute", 1, 5),
            artist("ZARD", 2, 180),
            artist("ZARDS", 3, 2),
        ];
        let resolution = ArtistResolver::default().resolve("ZARD", &candidates).unwrap();
        assert_eq!(resolution.artist.reference, "https://www.uta-net.com/artist/2/");
    }

    #[test]
    fn test_similarity_pick() {
        let candidates = vec![artist("奥井雅美", 1, 200), artist("奥井亜紀", 2, 40)];
        // Full-width spacing and a trailing annotation differ from the catalog name
        let resolution = ArtistResolver::default().resolve("奥井雅美 (Masami Okui)", &candidates).unwrap();
        assert_eq!(resolution.artist.name, "奥井雅美");
        assert_eq!(resolution.score, 1.0);
        assert!(!resolution.exact);
    }

    #[test]
    fn test_below_threshold_is_not_found() {
        let candidates = vec![artist("B'z", 1, 300)];
        let err = ArtistResolver::default().resolve("ZARD", &candidates).unwrap_err();
        match err {
            Error::NotFound { query, best } => {
                assert_eq!(query, "ZARD");
                assert_eq!(best.unwrap().name, "B'z");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_no_candidates_is_not_found() {
        let err = ArtistResolver::default().resolve("ZARD", &[]).unwrap_err();
        assert!(matches!(err, Error::NotFound { best: None, .. }));
    }

    #[test]
    fn test_tie_is_ambiguous() {
        let candidates = vec![artist("Lisa", 1, 20), artist("LiSA", 2, 150), artist("Lisa Ono", 3, 4)];
        let err = ArtistResolver::default().resolve("LISA", &candidates).unwrap_err();
        match err {
            Error::Ambiguous { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.iter().all(|c| c.score == 1.0));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_exact_names_are_ambiguous() {
        let candidates = vec![artist("misono", 1, 50), artist("misono", 2, 3)];
        let err = ArtistResolver::default().resolve("misono", &candidates).unwrap_err();
        assert!(matches!(err, Error::Ambiguous { .. }));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let candidates = vec![artist("abcd", 1, 1)];
        // "abxy" vs "abcd": two substitutions over four characters
        assert!(ArtistResolver::new(0.5).resolve("abxy", &candidates).is_ok());
        assert!(ArtistResolver::new(0.6).resolve("abxy", &candidates).is_err());
    }
}
