//! Core data models for lyrics matching.
//!
//! This module contains the entities the matcher works on (local tracks,
//! catalog artists and entries), the per-track results, and run statistics.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

// ============================================================================
// Local Tracks
// ============================================================================

/// A local audio file. Identity is the path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AudioTrack {
    pub path: PathBuf,
    pub file_name: String,
    pub artist: Option<String>,
    pub title: Option<String>,
}

impl AudioTrack {
    /// Build a track from its path and whatever tags could be read.
    /// Blank tag values are treated as absent.
    pub fn new(
        path: impl Into<PathBuf>,
        artist: Option<String>,
        title: Option<String>,
    ) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                Error::invalid("audio track", format!("'{}' has no file name", path.display()))
            })?;

        Ok(Self {
            path,
            file_name,
            artist: non_blank(artist),
            title: non_blank(title),
        })
    }

    /// Filename without its extension.
    pub fn file_stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name.clone())
    }

    /// Title used for matching: the title tag, else the filename stem.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.file_stem())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Catalog Models
// ============================================================================

/// An artist page on the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogArtist {
    pub name: String,
    /// Absolute URL of the artist page
    pub reference: String,
    pub entry_count: u32,
}

impl CatalogArtist {
    pub fn new(name: impl Into<String>, reference: impl Into<String>, entry_count: u32) -> Result<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(Error::invalid("catalog artist", "empty page reference"));
        }
        Ok(Self {
            name: name.into().trim().to_string(),
            reference,
            entry_count,
        })
    }
}

impl fmt::Display for CatalogArtist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} songs) <{}>", self.name, self.entry_count, self.reference)
    }
}

/// One lyric entry in an artist's title list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogTitleEntry {
    pub title: String,
    /// Absolute URL of the lyrics page
    pub reference: String,
    pub artist: String,
}

impl CatalogTitleEntry {
    pub fn new(
        title: impl Into<String>,
        reference: impl Into<String>,
        artist: impl Into<String>,
    ) -> Result<Self> {
        let title = title.into().trim().to_string();
        let reference = reference.into();
        if title.is_empty() {
            return Err(Error::invalid("catalog entry", "empty title"));
        }
        if reference.trim().is_empty() {
            return Err(Error::invalid("catalog entry", format!("'{}' has no page reference", title)));
        }
        Ok(Self {
            title,
            reference,
            artist: artist.into(),
        })
    }
}

/// A row from a catalog-wide song search.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub title: String,
    pub artist: String,
    pub reference: String,
}

impl SearchHit {
    /// The hit as a title entry, so it flows through the same fetch/write path.
    pub fn into_entry(self) -> Result<CatalogTitleEntry> {
        CatalogTitleEntry::new(self.title, self.reference, self.artist)
    }
}

// ============================================================================
// Match Results
// ============================================================================

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    Substring,
    Similarity,
    TitleSearch,
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchMethod::Substring => "substring",
            MatchMethod::Similarity => "similarity",
            MatchMethod::TitleSearch => "title-search",
        };
        f.write_str(s)
    }
}

/// Why a track ended the run without lyrics.
/// The fields are diagnostics for the summary and the JSON report.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// lofty could not open or parse the file
    UnreadableFile { message: String },
    /// Per-file mode needs an artist tag
    NoArtist,
    /// The title normalized to nothing
    EmptyTitle,
    /// Per-file artist resolution failed
    ArtistUnresolved { message: String },
    /// The artist has no entries to match against
    NoEntries,
    /// No strategy accepted a candidate
    NoMatch {
        title: String,
        best_candidate: Option<String>,
        best_score: Option<f64>,
    },
    /// A catalog request failed
    Fetch { message: String },
    /// The lyrics page had no lyrics
    NoLyrics { title: String },
    /// Writing the lyrics tag failed
    Write { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::UnreadableFile { message } => write!(f, "Could not open file: {}", message),
            FailureReason::NoArtist => f.write_str("No artist found"),
            FailureReason::EmptyTitle => f.write_str("No title found"),
            FailureReason::ArtistUnresolved { message } => write!(f, "No artist found: {}", message),
            FailureReason::NoEntries => f.write_str("Artist has no songs in the catalog"),
            FailureReason::NoMatch {
                title,
                best_candidate: Some(candidate),
                best_score: Some(score),
            } => write!(
                f,
                "No matching song found for '{}' (closest: '{}', similarity: {:.2})",
                title, candidate, score
            ),
            FailureReason::NoMatch { title, .. } => write!(f, "No matching song found for '{}'", title),
            FailureReason::Fetch { message } => write!(f, "Fetch failed: {}", message),
            FailureReason::NoLyrics { title } => write!(f, "No lyrics found for '{}'", title),
            FailureReason::Write { message } => write!(f, "Error writing lyrics: {}", message),
        }
    }
}

/// Outcome of matching one track.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched {
        entry: CatalogTitleEntry,
        method: MatchMethod,
        /// Absent for substring matches
        score: Option<f64>,
    },
    Unmatched { reason: FailureReason },
}

/// One matching decision for one track.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub track: AudioTrack,
    #[serde(flatten)]
    pub outcome: MatchOutcome,
}

impl MatchResult {
    pub fn matched(track: AudioTrack, entry: CatalogTitleEntry, method: MatchMethod, score: Option<f64>) -> Self {
        Self {
            track,
            outcome: MatchOutcome::Matched {
                entry,
                method,
                score: score.map(|s| s.clamp(0.0, 1.0)),
            },
        }
    }

    pub fn unmatched(track: AudioTrack, reason: FailureReason) -> Self {
        Self {
            track,
            outcome: MatchOutcome::Unmatched { reason },
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.outcome, MatchOutcome::Matched { .. })
    }

    pub fn entry(&self) -> Option<&CatalogTitleEntry> {
        match &self.outcome {
            MatchOutcome::Matched { entry, .. } => Some(entry),
            MatchOutcome::Unmatched { .. } => None,
        }
    }

    pub fn method(&self) -> Option<MatchMethod> {
        match &self.outcome {
            MatchOutcome::Matched { method, .. } => Some(*method),
            MatchOutcome::Unmatched { .. } => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match &self.outcome {
            MatchOutcome::Matched { score, .. } => *score,
            MatchOutcome::Unmatched { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            MatchOutcome::Matched { .. } => None,
            MatchOutcome::Unmatched { reason } => Some(reason),
        }
    }
}

// ============================================================================
// Run Reports
// ============================================================================

/// Final status of one track after a run.
#[derive(Clone, Debug, Serialize)]
pub struct TrackReport {
    pub path: PathBuf,
    pub file_name: String,
    /// Present when matching ran for this track
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl TrackReport {
    pub fn success(result: MatchResult) -> Self {
        Self {
            path: result.track.path.clone(),
            file_name: result.track.file_name.clone(),
            result: Some(result),
            failure: None,
        }
    }

    /// A failure from a stage after matching (fetch, empty lyrics, write).
    pub fn failed_after_match(result: MatchResult, reason: FailureReason) -> Self {
        Self {
            path: result.track.path.clone(),
            file_name: result.track.file_name.clone(),
            result: Some(result),
            failure: Some(reason),
        }
    }

    /// A failure before or during matching.
    pub fn failed(path: impl Into<PathBuf>, file_name: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            path: path.into(),
            file_name: file_name.into(),
            result: None,
            failure: Some(reason),
        }
    }

    pub fn unmatched(result: MatchResult) -> Self {
        let reason = result.failure().cloned().unwrap_or(FailureReason::NoEntries);
        Self::failed_after_match(result, reason)
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Per-run statistics.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,

    // Matches by strategy
    pub substring_matches: usize,
    pub similarity_matches: usize,
    pub title_search_matches: usize,

    // Title-search fallback
    pub fallback_attempted: usize,
    pub fallback_narrowed_queries: usize,

    // Failures by stage
    pub unreadable_files: usize,
    pub unmatched: usize,
    pub fetch_failures: usize,
    pub empty_lyrics: usize,
    pub write_failures: usize,

    pub artist_resolutions: usize,
    pub dry_run: bool,
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            100.0 * self.succeeded as f64 / self.total_files as f64
        }
    }

    /// Count one finished track.
    pub fn record(&mut self, report: &TrackReport) {
        self.total_files += 1;
        if let Some(method) = report.result.as_ref().and_then(MatchResult::method) {
            match method {
                MatchMethod::Substring => self.substring_matches += 1,
                MatchMethod::Similarity => self.similarity_matches += 1,
                MatchMethod::TitleSearch => self.title_search_matches += 1,
            }
        }
        match &report.failure {
            None => self.succeeded += 1,
            Some(reason) => {
                self.failed += 1;
                match reason {
                    FailureReason::UnreadableFile { .. } => self.unreadable_files += 1,
                    FailureReason::Fetch { .. } => self.fetch_failures += 1,
                    FailureReason::NoLyrics { .. } => self.empty_lyrics += 1,
                    FailureReason::Write { .. } => self.write_failures += 1,
                    _ => self.unmatched += 1,
                }
            }
        }
    }
}

/// Everything a run produced, in track order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stats: RunStats,
    pub tracks: Vec<TrackReport>,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &TrackReport> {
        self.tracks.iter().filter(|t| !t.is_success())
    }

    /// Write the report as pretty JSON
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidReport {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
