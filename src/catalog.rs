//! The remote catalog seen from the matcher.
//!
//! [`crate::utanet::UtaNetClient`] is the production implementation; tests use
//! an in-memory one. Every call may fail with [`crate::error::Error::Fetch`].

use crate::error::Result;
use crate::models::{CatalogArtist, CatalogTitleEntry, SearchHit};

/// Read access to a lyrics catalog.
pub trait Catalog {
    /// Artist pages whose names match a free-text query, in site order.
    fn fetch_artist_candidates(&self, name: &str) -> Result<Vec<CatalogArtist>>;

    /// Every lyric entry listed for an artist, across all listing pages, in site order.
    fn fetch_title_entries(&self, artist: &CatalogArtist) -> Result<Vec<CatalogTitleEntry>>;

    /// Lyrics text for an entry. An empty string means the page had none.
    fn fetch_lyrics(&self, entry: &CatalogTitleEntry) -> Result<String>;

    /// Catalog-wide title search. `artist_hint` is informational: the caller
    /// scores artist agreement itself.
    fn search_catalog(&self, title_query: &str, artist_hint: &str) -> Result<Vec<SearchHit>>;
}
