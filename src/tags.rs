//! Audio file discovery and tag I/O.
//!
//! Supports MP3 (ID3v2), FLAC/OGG (Vorbis comments) and M4A/AAC (MP4 ilst)
//! through lofty's format-agnostic tag API.

use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::models::AudioTrack;

/// Extensions picked up by [`scan_directory`] (compared case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "ogg", "aac"];

/// Check whether a path has one of the supported audio extensions.
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

/// List the audio files in `dir`, sorted by name.
///
/// Only the top level is scanned unless `recursive` is set. Unreadable
/// subdirectories are skipped rather than failing the scan.
pub fn scan_directory(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("'{}' is not a directory", dir.display()),
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_audio_file(e.path()))
        .map(|e| e.into_path())
        .collect();

    if !recursive {
        files.sort();
    }
    Ok(files)
}

// ============================================================================
// Tag Access
// ============================================================================

/// Source of artist/title tags.
pub trait TrackReader {
    fn read_track(&self, path: &Path) -> Result<AudioTrack>;
}

/// Sink for fetched lyrics.
pub trait LyricsWriter {
    /// Store `lyrics` in the track's lyrics tag, replacing any previous lyrics.
    fn write_lyrics(&self, track: &AudioTrack, lyrics: &str) -> Result<()>;
}

/// lofty-backed tag access for real files.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTags;

impl TrackReader for LoftyTags {
    fn read_track(&self, path: &Path) -> Result<AudioTrack> {
        let tagged_file = Probe::open(path)
            .map_err(|e| Error::tag(path, e))?
            .read()
            .map_err(|e| Error::tag(path, e))?;

        // Primary tag, else whatever tag the file has
        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());
        let artist = tag.and_then(|t| t.artist().map(|s| s.to_string()));
        let title = tag.and_then(|t| t.title().map(|s| s.to_string()));

        AudioTrack::new(path, artist, title)
    }
}

impl LyricsWriter for LoftyTags {
    fn write_lyrics(&self, track: &AudioTrack, lyrics: &str) -> Result<()> {
        let path = track.path.as_path();
        let mut tagged_file = Probe::open(path)
            .map_err(|e| Error::tag(path, e))?
            .read()
            .map_err(|e| Error::tag(path, e))?;

        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file
            .tag_mut(tag_type)
            .ok_or_else(|| Error::tag(path, "could not create a tag"))?;

        // Replaces an existing lyrics item
        tag.insert_text(ItemKey::Lyrics, lyrics.to_string());
        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| Error::tag(path, e))
    }
}
