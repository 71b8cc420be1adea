//! uta-net page scraping.
//!
//! The pages are server-rendered tables with stable class names, so a handful
//! of patterns is enough. Every parser here is pure: HTML in, rows out. The
//! HTTP side lives in [`crate::utanet`].

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Site root used to absolutize relative links
pub const BASE_URL: &str = "https://www.uta-net.com";

// ============================================================================
// REGEX PATTERNS
// ============================================================================

static SONGLIST_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<tbody[^>]*class="[^"]*songlist-table-body[^"]*"[^>]*>(.*?)</tbody>"#).unwrap()
});

static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap());

static ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<a\s[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#).unwrap());

/// First cell of a title row; its first link is the lyrics page
static TITLE_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<td[^>]*class="[^"]*sp-w-100[^"]*"[^>]*>(.*?)</td>"#).unwrap()
});

static BOLD_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="[^"]*fw-bold[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});

static SONG_COUNT_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="[^"]*song-count[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});

static SONGLIST_TITLE_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<span[^>]*class="[^"]*songlist-title[^"]*"[^>]*>(.*?)</span>"#).unwrap()
});

static SONG_HREF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:https?://www\.uta-net\.com)?/song/\d+/?$").unwrap());

static ARTIST_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:https?://www\.uta-net\.com)?/artist/\d+/?$").unwrap());

/// "全12ページ中 1ページ目を表示"
static PAGE_TOTAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"全\s*(\d+)\s*ページ中").unwrap());

static LYRICS_AREA_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<div[^>]*id="kashi_area"[^>]*>"#).unwrap());

static DIV_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<(/)?div\b[^>]*>").unwrap());

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());

static ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").unwrap());

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// ============================================================================
// Row Types
// ============================================================================

/// One row of the artist search table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistRow {
    pub name: String,
    pub href: String,
    pub song_count: u32,
}

/// One row of an artist's title table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleRow {
    pub title: String,
    pub href: String,
    /// Artist credited in the row, when the table shows one
    pub artist: Option<String>,
}

/// One row of the song search table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongRow {
    pub title: String,
    pub href: String,
    pub artist: String,
}

// ============================================================================
// Text Helpers
// ============================================================================

/// Decode the entities uta-net emits: the five XML ones, `&nbsp;` and numeric references.
/// Unknown named entities are left as written.
pub fn decode_entities(s: &str) -> String {
    ENTITY
        .replace_all(s, |caps: &Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match body {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Drop tags, decode entities, trim.
pub fn inner_text(fragment: &str) -> String {
    decode_entities(&ANY_TAG.replace_all(fragment, "")).trim().to_string()
}

/// Resolve a site-relative link against [`BASE_URL`].
pub fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", BASE_URL, href)
    } else {
        format!("{}/{}", BASE_URL, href)
    }
}

/// Row bodies inside the song-list table(s) of a page.
fn songlist_rows(html: &str) -> impl Iterator<Item = &str> {
    SONGLIST_BODY
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .flat_map(|body| TABLE_ROW.captures_iter(body.as_str()))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
}

fn first_number(s: &str) -> Option<u32> {
    DIGITS.find(s).and_then(|m| m.as_str().parse().ok())
}

// ============================================================================
// Page Parsers
// ============================================================================

/// Parse the artist search result table.
pub fn parse_artist_rows(html: &str) -> Vec<ArtistRow> {
    let mut rows = Vec::new();
    for row in songlist_rows(html) {
        let Some(link) = ANCHOR.captures(row) else {
            continue;
        };
        let inner = &link[2];
        let name = match BOLD_SPAN.captures(inner) {
            Some(span) => inner_text(&span[1]),
            None => inner_text(inner),
        };
        if name.is_empty() {
            continue;
        }
        let song_count = SONG_COUNT_SPAN
            .captures(inner)
            .or_else(|| SONG_COUNT_SPAN.captures(row))
            .and_then(|span| first_number(&inner_text(&span[1])))
            .unwrap_or(0);
        rows.push(ArtistRow {
            name,
            href: absolute_url(&link[1]),
            song_count,
        });
    }
    rows
}

/// Parse the title table on an artist page.
pub fn parse_title_rows(html: &str) -> Vec<TitleRow> {
    let mut rows = Vec::new();
    for row in songlist_rows(html) {
        let Some(cell) = TITLE_CELL.captures(row) else {
            continue;
        };
        let Some(link) = ANCHOR.captures(&cell[1]) else {
            continue;
        };
        let Some(title_span) = SONGLIST_TITLE_SPAN.captures(&link[2]) else {
            continue;
        };
        let title = inner_text(&title_span[1]);
        if title.is_empty() {
            continue;
        }
        let artist = ANCHOR
            .captures_iter(row)
            .find(|a| ARTIST_HREF.is_match(&a[1]))
            .map(|a| inner_text(&a[2]))
            .filter(|a| !a.is_empty());
        rows.push(TitleRow {
            title,
            href: absolute_url(&link[1]),
            artist,
        });
    }
    rows
}

/// Parse the song search result table. Rows without both a song link and an
/// artist link are skipped.
pub fn parse_song_rows(html: &str) -> Vec<SongRow> {
    let mut rows = Vec::new();
    for row in songlist_rows(html) {
        let mut song: Option<(String, String)> = None;
        let mut artist: Option<String> = None;
        for link in ANCHOR.captures_iter(row) {
            let href = &link[1];
            if song.is_none() && SONG_HREF.is_match(href) {
                let title = match SONGLIST_TITLE_SPAN.captures(&link[2]) {
                    Some(span) => inner_text(&span[1]),
                    None => inner_text(&link[2]),
                };
                song = Some((title, absolute_url(href)));
            } else if artist.is_none() && ARTIST_HREF.is_match(href) {
                artist = Some(inner_text(&link[2]));
            }
        }
        if let (Some((title, href)), Some(artist)) = (song, artist) {
            if !title.is_empty() {
                rows.push(SongRow { title, href, artist });
            }
        }
    }
    rows
}

/// Number of title pages an artist listing spans (1 when no pager is shown).
pub fn parse_page_count(html: &str) -> u32 {
    PAGE_TOTAL
        .captures(html)
        .and_then(|c| c[1].parse::<u32>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1)
}

/// Extract the lyrics text from a lyrics page.
///
/// `<br>` becomes a newline, remaining markup is dropped, runs of blank lines
/// collapse to one. `None` when the page has no lyrics block or it is empty.
/// Inner HTML of the lyrics `div`, up to its own closing tag.
/// An unclosed area runs to the end of the page.
fn lyrics_area(html: &str) -> Option<&str> {
    let open = LYRICS_AREA_OPEN.find(html)?;
    let body = &html[open.end()..];
    let mut depth = 1usize;
    for tag in DIV_TAG.captures_iter(body) {
        if tag.get(1).is_none() {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            let close = tag.get(0)?;
            return Some(&body[..close.start()]);
        }
    }
    Some(body)
}

pub fn parse_lyrics(html: &str) -> Option<String> {
    let area = lyrics_area(html)?;
    let with_breaks = LINE_BREAK.replace_all(area, "\n");
    let text = decode_entities(&ANY_TAG.replace_all(&with_breaks, ""));
    let lines: Vec<&str> = text.split('\n').map(|line| line.trim_end_matches('\r').trim_end()).collect();
    let joined = BLANK_LINES.replace_all(&lines.join("\n"), "\n\n").trim().to_string();
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTIST_SEARCH: &str = r#"
<table class="table songlist-table">
<tbody class="songlist-table-body">
<tr class="border-bottom">
  <td class="sp-w-100 pt-0 pt-lg-2">
    <a href="/artist/6234/"><span class="fw-bold">下川みくに</span><span class="song-count">110曲</span></a>
  </td>
</tr>
<tr class="border-bottom">
  <td class="sp-w-100 pt-0 pt-lg-2">
    <a href="/artist/31000/"><span class="fw-bold">下川みくに &amp; 仲間たち</span><span class="song-count">2曲</span></a>
  </td>
</tr>
</tbody>
</table>"#;

    const ARTIST_PAGE: &str = r#"
<div class="col-7 col-lg-3 text-start text-lg-end d-none d-lg-block">全2ページ中 1ページ目を表示</div>
<tbody class="songlist-table-body">
<tr class="border-bottom">
  <td class="sp-w-100 pt-0 pt-lg-2">
    <a href="/song/11111/" class="py-2 py-lg-0"><span class="fw-bold songlist-title pb-1 pb-lg-0">それが愛でしょう</span>
    <span class="d-block d-lg-none utaidashi text-truncate">今ここにいること</span></a>
  </td>
  <td class="sp-none fw-bold"><a href="/artist/6234/">下川みくに</a></td>
</tr>
<tr class="border-bottom">
  <td class="sp-w-100 pt-0 pt-lg-2">
    <a href="/song/22222/"><span class="fw-bold songlist-title">Trust &#x26; Believe</span></a>
  </td>
</tr>
<tr><td class="sp-w-100"><a href="/song/33333/"><span class="songlist-title"></span></a></td></tr>
</tbody>"#;

    const SONG_SEARCH: &str = r#"
<tbody class="songlist-table-body">
<tr class="border-bottom">
  <td class="sp-w-100 pt-0 pt-lg-2">
    <a href="/song/44444/"><span class="fw-bold songlist-title">輪舞-revolution- feat.浦嶋りんこ</span></a>
    <a href="/artist/500/"><span>奥井雅美</span></a>
  </td>
</tr>
<tr><td class="sp-w-100"><a href="/song/55555/"><span class="songlist-title">orphan</span></a></td></tr>
</tbody>"#;

    const LYRICS_PAGE: &str = r#"<html><body>
<div id="kashi_area" itemprop="text">一行目<br>二行目<br /><br><br><br>三行目 &amp; 四行目<br></div>
<div id="other">ignored</div></body></html>"#;

    #[test]
    fn test_parse_artist_rows() {
        let rows = parse_artist_rows(ARTIST_SEARCH);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "下川みくに");
        assert_eq!(rows[0].href, "https://www.uta-net.com/artist/6234/");
        assert_eq!(rows[0].song_count, 110);
        assert_eq!(rows[1].name, "下川みくに & 仲間たち");
        assert_eq!(rows[1].song_count, 2);
    }

    #[test]
    fn test_parse_title_rows() {
        let rows = parse_title_rows(ARTIST_PAGE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "それが愛でしょう");
        assert_eq!(rows[0].href, "https://www.uta-net.com/song/11111/");
        assert_eq!(rows[0].artist.as_deref(), Some("下川みくに"));
        assert_eq!(rows[1].title, "Trust & Believe");
        assert_eq!(rows[1].artist, None);
    }

    #[test]
    fn test_parse_page_count() {
        assert_eq!(parse_page_count(ARTIST_PAGE), 2);
        assert_eq!(parse_page_count("<html>no pager</html>"), 1);
        assert_eq!(parse_page_count("全0ページ中"), 1);
    }

    #[test]
    fn test_parse_song_rows_requires_artist() {
        let rows = parse_song_rows(SONG_SEARCH);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "輪舞-revolution- feat.浦嶋りんこ");
        assert_eq!(rows[0].artist, "奥井雅美");
        assert_eq!(rows[0].href, "https://www.uta-net.com/song/44444/");
    }

    #[test]
    fn test_parse_lyrics() {
        let lyrics = parse_lyrics(LYRICS_PAGE).unwrap();
        assert_eq!(lyrics, "一行目\n二行目\n\n三行目 & 四行目");
    }

    #[test]
    fn test_parse_lyrics_nested_div() {
        let page = r#"<div id="kashi_area" itemprop="text">一行目<br><div class="ruby">二行目</div><br>三行目</div>
<div class="share">シェアする</div>"#;
        assert_eq!(parse_lyrics(page).unwrap(), "一行目\n二行目\n三行目");
    }

    #[test]
    fn test_parse_lyrics_missing_or_empty() {
        assert_eq!(parse_lyrics("<div id=\"other\">x</div>"), None);
        assert_eq!(parse_lyrics("<div id=\"kashi_area\"> <br> </div>"), None);
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &lt;c&gt; &#12354;&#x3042;"), "a & b <c> ああ");
        assert_eq!(decode_entities("&bogus; &quot;q&quot;"), "&bogus; \"q\"");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(absolute_url("/song/1/"), "https://www.uta-net.com/song/1/");
        assert_eq!(absolute_url("https://www.uta-net.com/artist/2/"), "https://www.uta-net.com/artist/2/");
    }
}
