//! Run orchestration: resolve the artist, match each track, fetch, write.
//!
//! Tracks are processed one at a time, in the order given. Anything that goes
//! wrong for a single track is recorded on its [`TrackReport`]; only the
//! run-level artist detection can fail the whole run.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::fallback::TitleSearchFallback;
use crate::matcher::{IndexedEntries, Matcher};
use crate::models::{
    AudioTrack, CatalogArtist, CatalogTitleEntry, FailureReason, MatchMethod, MatchResult, RunReport, RunStats,
    TrackReport,
};
use crate::progress::{create_progress_bar, create_spinner, format_duration};
use crate::resolver::ArtistResolver;
use crate::scoring::MatchConfig;
use crate::tags::{LyricsWriter, TrackReader};

/// Where the artist catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtistSource {
    /// An artist page URL given by the user; no resolution
    Url(String),
    /// Resolve the first track's artist tag once for the whole run
    AutoDetect,
    /// Resolve every track's own artist tag
    PerFile,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub artist_source: ArtistSource,
    /// Try the catalog-wide title search for tracks the artist catalog missed
    pub title_search: bool,
    /// Match and fetch, but leave the files alone
    pub dry_run: bool,
    pub config: MatchConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            artist_source: ArtistSource::AutoDetect,
            title_search: false,
            dry_run: false,
            config: MatchConfig::default(),
        }
    }
}

/// The artist shared by every track of a run.
struct ArtistContext {
    entries: Vec<CatalogTitleEntry>,
    /// Artist name passed to the title search when a track has no artist tag
    hint: String,
}

pub struct Tagger<'a, C: Catalog, T: TrackReader + LyricsWriter> {
    catalog: &'a C,
    tags: &'a T,
    options: RunOptions,
    matcher: Matcher,
    resolver: ArtistResolver,
}

impl<'a, C: Catalog, T: TrackReader + LyricsWriter> Tagger<'a, C, T> {
    pub fn new(catalog: &'a C, tags: &'a T, options: RunOptions) -> Self {
        let config = options.config.clamped();
        Self {
            catalog,
            tags,
            matcher: Matcher::new(&config),
            resolver: ArtistResolver::new(config.artist_threshold),
            options: RunOptions { config, ..options },
        }
    }

    /// Process `paths` in order.
    ///
    /// Errors only for run-level failures: the auto-detected artist could not
    /// be read, resolved or fetched, or the explicit artist page failed.
    pub fn run(&self, paths: &[PathBuf]) -> Result<RunReport> {
        let start = Instant::now();
        let mut stats = RunStats {
            dry_run: self.options.dry_run,
            ..RunStats::default()
        };

        let shared = self.shared_context(paths, &mut stats)?;
        let mut catalog_cache: FxHashMap<String, Vec<CatalogTitleEntry>> = FxHashMap::default();
        let mut tracks = Vec::with_capacity(paths.len());

        let pb = create_progress_bar(paths.len() as u64, "Tagging");
        for path in paths {
            let report = self.process_path(path, shared.as_ref(), &mut catalog_cache, &mut stats);
            stats.record(&report);
            tracks.push(report);
            pb.inc(1);
        }
        pb.finish_and_clear();

        stats.elapsed_seconds = start.elapsed().as_secs_f64();
        info!(
            "Processed {} files in {}: {} succeeded, {} failed",
            stats.total_files,
            format_duration(start.elapsed()),
            stats.succeeded,
            stats.failed
        );
        Ok(RunReport { stats, tracks })
    }

    // ------------------------------------------------------------------------
    // Artist-level work
    // ------------------------------------------------------------------------

    fn shared_context(&self, paths: &[PathBuf], stats: &mut RunStats) -> Result<Option<ArtistContext>> {
        let artist = match &self.options.artist_source {
            ArtistSource::PerFile => return Ok(None),
            ArtistSource::Url(url) => {
                info!("Using artist page {}", url);
                CatalogArtist::new("", url.as_str(), 0)?
            }
            ArtistSource::AutoDetect => {
                let Some(first) = paths.first() else {
                    return Ok(None);
                };
                let track = self.tags.read_track(first)?;
                let name = track
                    .artist
                    .ok_or_else(|| Error::tag(first, "could not read artist to auto-detect from"))?;
                info!("Detected artist: {}", name);
                stats.artist_resolutions += 1;
                self.resolve_artist(&name)?
            }
        };

        let entries = self.fetch_entries(&artist)?;
        let hint = if artist.name.is_empty() {
            entries.first().map(|e| e.artist.clone()).unwrap_or_default()
        } else {
            artist.name.clone()
        };
        Ok(Some(ArtistContext { entries, hint }))
    }

    fn resolve_artist(&self, name: &str) -> Result<CatalogArtist> {
        let candidates = self.catalog.fetch_artist_candidates(name)?;
        let resolution = self.resolver.resolve(name, &candidates)?;
        info!(
            "Best artist match (similarity: {:.2}): {}",
            resolution.score, resolution.artist
        );
        Ok(resolution.artist)
    }

    fn fetch_entries(&self, artist: &CatalogArtist) -> Result<Vec<CatalogTitleEntry>> {
        let spinner = create_spinner(&format!("Fetching titles for {}", artist.reference));
        let entries = self.catalog.fetch_title_entries(artist);
        spinner.finish_and_clear();

        let entries = entries?;
        if entries.is_empty() {
            warn!(
                "{}",
                Error::NoEntries {
                    artist: artist.reference.clone()
                }
            );
        } else {
            info!("Collected {} titles from {}", entries.len(), artist.reference);
        }
        Ok(entries)
    }

    // ------------------------------------------------------------------------
    // Track-level work
    // ------------------------------------------------------------------------

    fn process_path(
        &self,
        path: &Path,
        shared: Option<&ArtistContext>,
        cache: &mut FxHashMap<String, Vec<CatalogTitleEntry>>,
        stats: &mut RunStats,
    ) -> TrackReport {
        let track = match self.tags.read_track(path) {
            Ok(track) => track,
            Err(e) => {
                warn!("Could not open {}. Skipping: {}", path.display(), e);
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                return TrackReport::failed(path, file_name, FailureReason::UnreadableFile { message: e.to_string() });
            }
        };

        // Set when a per-file artist did not resolve; the title search may still rescue the track
        let mut unresolved = None;
        let (entries, hint): (&[CatalogTitleEntry], String) = match shared {
            Some(context) => (
                context.entries.as_slice(),
                track.artist.clone().unwrap_or_else(|| context.hint.clone()),
            ),
            None => {
                let Some(name) = track.artist.clone() else {
                    warn!("No artist found for {}. Skipping.", track.file_name);
                    return failed(&track, FailureReason::NoArtist);
                };
                info!("Processing {} - Artist: {}", track.file_name, name);
                stats.artist_resolutions += 1;
                match self.entries_for_artist(&name, cache) {
                    Ok(entries) => (entries, name),
                    Err(reason @ FailureReason::ArtistUnresolved { .. }) if self.options.title_search => {
                        debug!("{}: {}; trying the title search", track.file_name, reason);
                        unresolved = Some(reason);
                        (&[][..], name)
                    }
                    Err(reason) => {
                        warn!("{}: {}", track.file_name, reason);
                        return failed(&track, reason);
                    }
                }
            }
        };

        let mut result = match unresolved {
            Some(reason) => MatchResult::unmatched(track.clone(), reason),
            None => {
                let indexed = IndexedEntries::new(entries);
                debug!("Matching {} against {} titles", track.file_name, indexed.len());
                let result = self.matcher.match_track(&track, &indexed);
                log_match(&result);
                result
            }
        };

        let searchable = !matches!(result.failure(), None | Some(FailureReason::EmptyTitle));
        if self.options.title_search && searchable {
            stats.fallback_attempted += 1;
            let fallback = TitleSearchFallback::new(self.catalog, &self.options.config);
            let attempt = fallback.search_track(&track, &hint);
            if attempt.narrowed() {
                stats.fallback_narrowed_queries += 1;
            }
            let fetch_failed = matches!(attempt.result.failure(), Some(FailureReason::Fetch { .. }));
            if attempt.result.is_matched() || fetch_failed {
                result = attempt.result;
            }
        }

        if result.is_matched() {
            self.deliver(result)
        } else {
            if let Some(reason) = result.failure() {
                warn!("{}: {}", track.file_name, reason);
            }
            TrackReport::unmatched(result)
        }
    }

    /// Resolve a per-file artist and return its titles, fetching each catalog once per run.
    fn entries_for_artist<'c>(
        &self,
        name: &str,
        cache: &'c mut FxHashMap<String, Vec<CatalogTitleEntry>>,
    ) -> std::result::Result<&'c [CatalogTitleEntry], FailureReason> {
        let artist = self.resolve_artist(name).map_err(|e| {
            if e.is_fetch() {
                FailureReason::Fetch { message: e.to_string() }
            } else {
                FailureReason::ArtistUnresolved { message: e.to_string() }
            }
        })?;

        if !cache.contains_key(&artist.reference) {
            let entries = self
                .fetch_entries(&artist)
                .map_err(|e| FailureReason::Fetch { message: e.to_string() })?;
            cache.insert(artist.reference.clone(), entries);
        } else {
            debug!("Reusing cached titles for {}", artist.reference);
        }
        Ok(cache.get(&artist.reference).map(Vec::as_slice).unwrap_or_default())
    }

    /// Fetch and write the lyrics for a matched track.
    fn deliver(&self, result: MatchResult) -> TrackReport {
        let Some(entry) = result.entry().cloned() else {
            return TrackReport::unmatched(result);
        };

        let lyrics = match self.catalog.fetch_lyrics(&entry) {
            Ok(lyrics) => lyrics,
            Err(e) => {
                warn!("{}: {}", result.track.file_name, e);
                return TrackReport::failed_after_match(result, FailureReason::Fetch { message: e.to_string() });
            }
        };

        if lyrics.trim().is_empty() {
            warn!("No lyrics found for '{}'.", entry.title);
            return TrackReport::failed_after_match(result, FailureReason::NoLyrics { title: entry.title });
        }

        debug!("Lyrics for '{}':\n{}", entry.title, lyrics);

        if self.options.dry_run {
            info!("Dry run: would write lyrics to '{}'", result.track.file_name);
            return TrackReport::success(result);
        }

        match self.tags.write_lyrics(&result.track, &lyrics) {
            Ok(()) => {
                info!("Lyrics added to {}", result.track.file_name);
                TrackReport::success(result)
            }
            Err(e) => {
                warn!("Error adding lyrics to {}: {}", result.track.file_name, e);
                TrackReport::failed_after_match(result, FailureReason::Write { message: e.to_string() })
            }
        }
    }
}

fn failed(track: &AudioTrack, reason: FailureReason) -> TrackReport {
    TrackReport::failed(&track.path, track.file_name.clone(), reason)
}

fn log_match(result: &MatchResult) {
    let (Some(entry), Some(method)) = (result.entry(), result.method()) else {
        return;
    };
    let title = result.track.display_title();
    match method {
        MatchMethod::Substring => info!("Found substring match: '{}' contains '{}'", title, entry.title),
        _ => info!(
            "Matched '{}' to '{}' (similarity: {:.2})",
            title,
            entry.title,
            result.score().unwrap_or_default()
        ),
    }
}
