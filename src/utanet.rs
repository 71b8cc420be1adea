//! Blocking uta-net client.
//!
//! Requests are spaced by a minimum delay so a full album run does not hammer
//! the site. Pages are parsed by [`crate::html`].

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use rustc_hash::FxHashSet;
use std::cell::Cell;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::html::{self, BASE_URL};
use crate::models::{CatalogArtist, CatalogTitleEntry, SearchHit};

/// Default spacing between two requests
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("utanet-tagger/", env!("CARGO_PKG_VERSION"));

static ARTIST_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://www\.uta-net\.com/artist/\d+/?").unwrap());

/// True for an uta-net artist page URL.
pub fn is_artist_url(url: &str) -> bool {
    ARTIST_URL.is_match(url.trim())
}

/// URL of page `page` (1-based) of an artist's title list.
pub fn artist_page_url(artist_url: &str, page: u32) -> String {
    if page <= 1 {
        artist_url.to_string()
    } else {
        format!("{}/0/{}/", artist_url.trim_end_matches('/'), page)
    }
}

/// Network settings for [`UtaNetClient`].
#[derive(Debug, Clone, Copy)]
pub struct ClientOptions {
    pub request_delay: Duration,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_delay: DEFAULT_REQUEST_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct UtaNetClient {
    client: Client,
    request_delay: Duration,
    last_request: Cell<Option<Instant>>,
}

impl UtaNetClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(options.timeout)
            .build()?;

        Ok(Self {
            client,
            request_delay: options.request_delay,
            last_request: Cell::new(None),
        })
    }

    fn rate_limit(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                std::thread::sleep(self.request_delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }

    /// GET a page and return its body. Non-2xx statuses are fetch errors.
    fn get_html(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        self.rate_limit();
        debug!("GET {} {:?}", url, query);

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(url, format!("HTTP status {}", status)));
        }
        Ok(response.text()?)
    }

    fn search(&self, target: &str, keyword: &str) -> Result<String> {
        let search_url = format!("{}/search/", BASE_URL);
        self.get_html(&search_url, &[("target", target), ("type", "in"), ("keyword", keyword)])
    }
}

impl Catalog for UtaNetClient {
    fn fetch_artist_candidates(&self, name: &str) -> Result<Vec<CatalogArtist>> {
        let page = self.search("art", name)?;
        let mut artists = Vec::new();
        for row in html::parse_artist_rows(&page) {
            match CatalogArtist::new(row.name, row.href, row.song_count) {
                Ok(artist) => artists.push(artist),
                Err(e) => warn!("Skipping artist row: {}", e),
            }
        }
        debug!("Artist search '{}' returned {} candidates", name, artists.len());
        Ok(artists)
    }

    fn fetch_title_entries(&self, artist: &CatalogArtist) -> Result<Vec<CatalogTitleEntry>> {
        let first = self.get_html(&artist.reference, &[])?;
        let total_pages = html::parse_page_count(&first);
        if total_pages > 1 {
            info!("Fetching {} pages of titles for {}", total_pages, artist.name);
        }

        let mut entries = Vec::new();
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut collect = |page: &str| {
            for row in html::parse_title_rows(page) {
                if !seen.insert(row.href.clone()) {
                    continue;
                }
                let owner = row.artist.unwrap_or_else(|| artist.name.clone());
                match CatalogTitleEntry::new(row.title, row.href, owner) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!("Skipping title row: {}", e),
                }
            }
        };

        collect(&first);
        for page in 2..=total_pages {
            let body = self.get_html(&artist_page_url(&artist.reference, page), &[])?;
            collect(&body);
        }

        debug!("{} has {} title entries", artist.name, entries.len());
        Ok(entries)
    }

    fn fetch_lyrics(&self, entry: &CatalogTitleEntry) -> Result<String> {
        let page = self.get_html(&entry.reference, &[])?;
        Ok(html::parse_lyrics(&page).unwrap_or_default())
    }

    fn search_catalog(&self, title_query: &str, artist_hint: &str) -> Result<Vec<SearchHit>> {
        let page = self.search("sng", title_query)?;
        let hits: Vec<SearchHit> = html::parse_song_rows(&page)
            .into_iter()
            .map(|row| SearchHit {
                title: row.title,
                artist: row.artist,
                reference: row.href,
            })
            .collect();
        debug!(
            "Title search '{}' (artist hint '{}') returned {} hits",
            title_query,
            artist_hint,
            hits.len()
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_artist_url() {
        assert!(is_artist_url("https://www.uta-net.com/artist/6234/"));
        assert!(is_artist_url("http://www.uta-net.com/artist/6234"));
        assert!(is_artist_url("  https://www.uta-net.com/artist/6234/  "));
        assert!(!is_artist_url("https://www.uta-net.com/song/6234/"));
        assert!(!is_artist_url("https://example.com/artist/6234/"));
        assert!(!is_artist_url("下川みくに"));
    }

    #[test]
    fn test_artist_page_url() {
        let base = "https://www.uta-net.com/artist/6234/";
        assert_eq!(artist_page_url(base, 1), base);
        assert_eq!(artist_page_url(base, 3), "https://www.uta-net.com/artist/6234/0/3/");
        assert_eq!(
            artist_page_url("https://www.uta-net.com/artist/6234", 2),
            "https://www.uta-net.com/artist/6234/0/2/"
        );
    }

    #[test]
    fn test_client_builds_with_defaults() {
        let client = UtaNetClient::new(ClientOptions::default()).unwrap();
        assert_eq!(client.request_delay, DEFAULT_REQUEST_DELAY);
        assert!(client.last_request.get().is_none());
    }
}
