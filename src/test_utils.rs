//! In-memory catalog and tag store for tests.
//!
//! Both fakes count their calls so tests can assert how often the network or
//! the files would have been touched.

use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::models::{AudioTrack, CatalogArtist, CatalogTitleEntry, SearchHit};
use crate::tags::{LyricsWriter, TrackReader};

pub fn artist(name: &str, id: u32, entry_count: u32) -> CatalogArtist {
    CatalogArtist::new(name, artist_url(id), entry_count).unwrap()
}

pub fn artist_url(id: u32) -> String {
    format!("https://www.uta-net.com/artist/{}/", id)
}

pub fn entry(title: &str, id: u32, artist: &str) -> CatalogTitleEntry {
    CatalogTitleEntry::new(title, format!("https://www.uta-net.com/song/{}/", id), artist).unwrap()
}

// ============================================================================
// Fake Catalog
// ============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    artists: FxHashMap<String, Vec<CatalogArtist>>,
    entries: FxHashMap<String, Vec<CatalogTitleEntry>>,
    lyrics: FxHashMap<String, String>,
    searches: FxHashMap<String, Vec<SearchHit>>,
    fail_search: bool,
    fail_lyrics_for: Vec<String>,
    artist_calls: Cell<usize>,
    entry_calls: Cell<usize>,
    lyrics_calls: Cell<usize>,
    search_calls: Cell<usize>,
}

impl FakeCatalog {
    pub fn with_artists(mut self, query: &str, artists: Vec<CatalogArtist>) -> Self {
        self.artists.insert(query.to_string(), artists);
        self
    }

    pub fn with_entries(mut self, artist_reference: &str, entries: Vec<CatalogTitleEntry>) -> Self {
        self.entries.insert(artist_reference.to_string(), entries);
        self
    }

    pub fn with_lyrics(mut self, entry_reference: &str, text: &str) -> Self {
        self.lyrics.insert(entry_reference.to_string(), text.to_string());
        self
    }

    pub fn with_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn failing_lyrics(mut self, entry_reference: &str) -> Self {
        self.fail_lyrics_for.push(entry_reference.to_string());
        self
    }

    pub fn artist_calls(&self) -> usize {
        self.artist_calls.get()
    }

    pub fn entry_calls(&self) -> usize {
        self.entry_calls.get()
    }

    pub fn lyrics_calls(&self) -> usize {
        self.lyrics_calls.get()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.get()
    }
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

impl Catalog for FakeCatalog {
    fn fetch_artist_candidates(&self, name: &str) -> Result<Vec<CatalogArtist>> {
        bump(&self.artist_calls);
        Ok(self.artists.get(name).cloned().unwrap_or_default())
    }

    fn fetch_title_entries(&self, artist: &CatalogArtist) -> Result<Vec<CatalogTitleEntry>> {
        bump(&self.entry_calls);
        Ok(self.entries.get(&artist.reference).cloned().unwrap_or_default())
    }

    fn fetch_lyrics(&self, entry: &CatalogTitleEntry) -> Result<String> {
        bump(&self.lyrics_calls);
        if self.fail_lyrics_for.contains(&entry.reference) {
            return Err(Error::fetch(&entry.reference, "HTTP status 503 Service Unavailable"));
        }
        Ok(self.lyrics.get(&entry.reference).cloned().unwrap_or_default())
    }

    fn search_catalog(&self, title_query: &str, _artist_hint: &str) -> Result<Vec<SearchHit>> {
        bump(&self.search_calls);
        if self.fail_search {
            return Err(Error::fetch("https://www.uta-net.com/search/", "connection reset"));
        }
        Ok(self.searches.get(title_query).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Fake Tags
// ============================================================================

/// Tracks keyed by path; paths without a track are unreadable.
#[derive(Default)]
pub struct FakeTags {
    tracks: FxHashMap<PathBuf, AudioTrack>,
    fail_write: bool,
    written: RefCell<Vec<(PathBuf, String)>>,
}

impl FakeTags {
    /// Register a readable track and return its path.
    pub fn add(&mut self, file_name: &str, artist: Option<&str>, title: Option<&str>) -> PathBuf {
        let path = PathBuf::from("/music").join(file_name);
        let track = AudioTrack::new(&path, artist.map(String::from), title.map(String::from)).unwrap();
        self.tracks.insert(path.clone(), track);
        path
    }

    pub fn failing_writes(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn written(&self) -> Vec<(PathBuf, String)> {
        self.written.borrow().clone()
    }
}

impl TrackReader for FakeTags {
    fn read_track(&self, path: &Path) -> Result<AudioTrack> {
        self.tracks
            .get(path)
            .cloned()
            .ok_or_else(|| Error::tag(path, "No supported tag format found"))
    }
}

impl LyricsWriter for FakeTags {
    fn write_lyrics(&self, track: &AudioTrack, lyrics: &str) -> Result<()> {
        if self.fail_write {
            return Err(Error::tag(&track.path, "read-only file"));
        }
        self.written.borrow_mut().push((track.path.clone(), lyrics.to_string()));
        Ok(())
    }
}
