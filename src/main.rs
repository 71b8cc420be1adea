use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use utanet_tagger::models::RunReport;
use utanet_tagger::pipeline::{ArtistSource, RunOptions, Tagger};
use utanet_tagger::progress::{self, format_duration};
use utanet_tagger::safety::validate_report_path;
use utanet_tagger::scoring::{
    MatchConfig, SubstringTiePolicy, ARTIST_ACCEPT_THRESHOLD, FALLBACK_ACCEPT_THRESHOLD, TITLE_ACCEPT_THRESHOLD,
};
use utanet_tagger::tags::{scan_directory, LoftyTags};
use utanet_tagger::utanet::{is_artist_url, ClientOptions, UtaNetClient};

#[derive(Parser, Debug)]
#[command(name = "utanet-tagger")]
#[command(about = "Add lyrics from uta-net.com to audio files")]
struct Args {
    /// Directory containing audio files
    #[arg(short, long, env = "UTANET_DIRECTORY", default_value = ".")]
    directory: PathBuf,

    /// uta-net.com artist page URL (default: auto-detect from the first file)
    #[arg(short, long, env = "UTANET_ARTIST_URL")]
    url: Option<String>,

    /// Search for the artist of each file individually
    #[arg(long)]
    per_file: bool,

    /// Search uta-net by title for files the artist page could not match
    #[arg(long, overrides_with = "no_title_search")]
    by_title: bool,

    /// Disable the title search (the default)
    #[arg(long, overrides_with = "by_title")]
    no_title_search: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Match and fetch lyrics without modifying any file
    #[arg(long)]
    dry_run: bool,

    /// Minimum similarity for a title match against the artist's titles
    #[arg(long, env = "UTANET_TITLE_THRESHOLD", default_value_t = TITLE_ACCEPT_THRESHOLD)]
    title_threshold: f64,

    /// Minimum similarity for an artist name to be accepted
    #[arg(long, env = "UTANET_ARTIST_THRESHOLD", default_value_t = ARTIST_ACCEPT_THRESHOLD)]
    artist_threshold: f64,

    /// Minimum score for a title search hit
    #[arg(long, env = "UTANET_FALLBACK_THRESHOLD", default_value_t = FALLBACK_ACCEPT_THRESHOLD)]
    fallback_threshold: f64,

    /// Which entry wins when several catalog titles contain each other
    #[arg(long, value_enum, default_value_t = SubstringTiePolicy::Longest)]
    substring_tie: SubstringTiePolicy,

    /// Minimum delay between uta-net requests
    #[arg(long, env = "UTANET_DELAY_MS", default_value_t = 300)]
    delay_ms: u64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "UTANET_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,

    /// Hide progress bars (for piping or tailing the output)
    #[arg(long)]
    log_only: bool,
}

impl Args {
    fn artist_source(&self) -> ArtistSource {
        if self.per_file {
            if self.url.is_some() {
                warn!("--url is ignored with --per-file");
            }
            return ArtistSource::PerFile;
        }
        match &self.url {
            Some(url) if is_artist_url(url) => ArtistSource::Url(url.trim().to_string()),
            Some(url) => {
                warn!("'{}' is not a uta-net artist page URL; auto-detecting instead", url);
                ArtistSource::AutoDetect
            }
            None => ArtistSource::AutoDetect,
        }
    }

    fn match_config(&self) -> MatchConfig {
        MatchConfig {
            title_threshold: self.title_threshold,
            artist_threshold: self.artist_threshold,
            fallback_threshold: self.fallback_threshold,
            substring_tie: self.substring_tie,
        }
    }
}

fn print_summary(report: &RunReport) {
    let stats = &report.stats;
    let failures: Vec<_> = report.failures().collect();

    if failures.is_empty() {
        println!("\nAll {} files processed successfully!", stats.total_files);
    } else {
        println!("\nSummary of files that failed:");
        println!("{:-<50}", "");
        for track in &failures {
            let reason = track.failure.as_ref().map(ToString::to_string).unwrap_or_default();
            println!("• {}: {}", track.file_name, reason);
        }
        println!("\nTotal: {} file(s) failed out of {}", failures.len(), stats.total_files);
    }

    println!("\n{:=<60}", "");
    println!(
        "  Matches: {} substring, {} similarity, {} title search",
        stats.substring_matches, stats.similarity_matches, stats.title_search_matches
    );
    println!("  Success rate: {:.1}%", stats.success_rate());
    println!(
        "  Elapsed: {}",
        format_duration(Duration::from_secs_f64(stats.elapsed_seconds))
    );
    if stats.dry_run {
        println!("  Dry run: no files were modified");
    }
    println!("{:=<60}", "");
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::from_default_env().add_directive("utanet_tagger=info".parse()?))
        .init();

    progress::set_log_only(args.log_only);

    if !args.directory.is_dir() {
        bail!("Directory '{}' does not exist", args.directory.display());
    }
    let files = scan_directory(&args.directory, args.recursive)
        .with_context(|| format!("Failed to scan {}", args.directory.display()))?;
    if files.is_empty() {
        bail!("No audio files found in {}", args.directory.display());
    }
    info!("Found {} audio files in {}", files.len(), args.directory.display());

    if let Some(report_path) = &args.report {
        validate_report_path(report_path, &files)?;
    }

    let client = UtaNetClient::new(ClientOptions {
        request_delay: Duration::from_millis(args.delay_ms),
        timeout: Duration::from_secs(args.timeout_secs),
    })
    .context("Failed to build HTTP client")?;

    let options = RunOptions {
        artist_source: args.artist_source(),
        title_search: args.by_title,
        dry_run: args.dry_run,
        config: args.match_config(),
    };

    let tags = LoftyTags;
    let report = Tagger::new(&client, &tags, options)
        .run(&files)
        .context("Could not load the artist catalog")?;

    print_summary(&report);

    if let Some(report_path) = &args.report {
        report
            .write_to_file(report_path)
            .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
        println!("Report written to {}", report_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["utanet-tagger"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_title_search_last_flag_wins() {
        assert!(!parse(&[]).by_title);
        assert!(parse(&["--by-title"]).by_title);
        assert!(!parse(&["--by-title", "--no-title-search"]).by_title);
        assert!(parse(&["--no-title-search", "--by-title"]).by_title);
    }

    #[test]
    fn test_artist_source() {
        let url = "https://www.uta-net.com/artist/6234/";
        assert_eq!(parse(&["-u", url]).artist_source(), ArtistSource::Url(url.to_string()));
        assert_eq!(parse(&["-u", "not a url"]).artist_source(), ArtistSource::AutoDetect);
        assert_eq!(parse(&["--per-file", "-u", url]).artist_source(), ArtistSource::PerFile);
    }

    #[test]
    fn test_every_flag_has_help() {
        use clap::CommandFactory;
        for arg in Args::command().get_arguments() {
            assert!(arg.get_help().is_some(), "--{} has no help text", arg.get_id());
        }
    }

    #[test]
    fn test_substring_tie_flag() {
        assert_eq!(parse(&[]).substring_tie, SubstringTiePolicy::Longest);
        assert_eq!(parse(&["--substring-tie", "first"]).substring_tie, SubstringTiePolicy::First);
    }
}
