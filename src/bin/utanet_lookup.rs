//! Inspect how an artist name resolves on uta-net.
//!
//! Usage:
//!   utanet-lookup "下川みくに"
//!   utanet-lookup "奥井雅美" --title "輪舞－revolution－"
//!   utanet-lookup "ZARD" --list

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use utanet_tagger::catalog::Catalog;
use utanet_tagger::error::Error;
use utanet_tagger::normalize::{clean_title, normalize_artist, normalize_title};
use utanet_tagger::resolver::ArtistResolver;
use utanet_tagger::scoring::{artist_agreement, fallback_score, similarity, ARTIST_ACCEPT_THRESHOLD};
use utanet_tagger::utanet::{ClientOptions, UtaNetClient};

#[derive(Parser)]
#[command(name = "utanet-lookup")]
#[command(about = "Show uta-net artist candidates, title search hits and title lists")]
struct Args {
    /// Artist name to resolve
    artist: String,

    /// Also run a catalog title search and score the hits against the artist
    #[arg(long)]
    title: Option<String>,

    /// Print the resolved artist's title list
    #[arg(long)]
    list: bool,

    /// Minimum similarity for an artist name to be accepted
    #[arg(long, env = "UTANET_ARTIST_THRESHOLD", default_value_t = ARTIST_ACCEPT_THRESHOLD)]
    artist_threshold: f64,

    /// Minimum delay between uta-net requests
    #[arg(long, env = "UTANET_DELAY_MS", default_value_t = 300)]
    delay_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "UTANET_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env().add_directive("utanet_tagger=warn".parse()?))
        .init();

    let client = UtaNetClient::new(ClientOptions {
        request_delay: Duration::from_millis(args.delay_ms),
        timeout: Duration::from_secs(args.timeout_secs),
    })
    .context("Failed to build HTTP client")?;

    let candidates = client
        .fetch_artist_candidates(&args.artist)
        .context("Artist search failed")?;

    println!("\nArtist candidates for '{}':", args.artist);
    println!("{:-<80}", "");
    if candidates.is_empty() {
        println!("No results found.");
    }
    let query_norm = normalize_artist(&args.artist);
    for candidate in &candidates {
        let score = similarity(&query_norm, &normalize_artist(&candidate.name));
        println!(
            "{:>5.2}  {} ({} songs)\n       {}",
            score, candidate.name, candidate.entry_count, candidate.reference
        );
    }

    let resolution = ArtistResolver::new(args.artist_threshold).resolve(&args.artist, &candidates);
    println!();
    match &resolution {
        Ok(r) => println!(
            "Resolved: {} (similarity: {:.2}{})",
            r.artist,
            r.score,
            if r.exact { ", exact" } else { "" }
        ),
        Err(e) => println!("Not resolved: {}", e),
    }

    if let Some(title) = &args.title {
        let query = clean_title(title);
        let title_key = normalize_title(title);
        let mut hits: Vec<_> = client
            .search_catalog(&query, &args.artist)
            .context("Title search failed")?
            .into_iter()
            .map(|hit| {
                let agreement = artist_agreement(&args.artist, &hit.artist);
                let score = fallback_score(similarity(&title_key, &normalize_title(&hit.title)), agreement);
                (score, agreement.score, hit)
            })
            .collect();
        hits.sort_by(|a, b| b.0.total_cmp(&a.0));

        println!("\nTitle search for '{}':", query);
        println!("{:-<80}", "");
        if hits.is_empty() {
            println!("No results found.");
        }
        for (score, artist_score, hit) in &hits {
            println!(
                "{:>5.2}  {} / {} (artist: {:.2})\n       {}",
                score, hit.title, hit.artist, artist_score, hit.reference
            );
        }
    }

    if args.list {
        if let Ok(r) = &resolution {
            let entries = client
                .fetch_title_entries(&r.artist)
                .context("Failed to fetch the title list")?;
            println!("\nTitles for {}:", r.artist.name);
            println!("{:-<80}", "");
            if entries.is_empty() {
                println!(
                    "{}",
                    Error::NoEntries {
                        artist: r.artist.name.clone()
                    }
                );
            }
            for (i, entry) in entries.iter().enumerate() {
                println!("{:>4}. {}  {}", i + 1, entry.title, entry.reference);
            }
        }
    }

    resolution.map(|_| ()).map_err(anyhow::Error::from)
}
