//! Library error type.
//!
//! Library modules return [`Error`] via `thiserror`; the binaries wrap it in
//! `anyhow` for context. Per-track problems are not errors at this level:
//! they are recorded as a [`crate::models::FailureReason`] on the track's
//! report so the run can continue.

use std::fmt;
use std::path::PathBuf;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// A catalog candidate with the score it reached, used in diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredName {
    pub name: String,
    pub score: f64,
}

impl ScoredName {
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

impl fmt::Display for ScoredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (similarity: {:.2})", self.name, self.score)
    }
}

fn join_candidates(candidates: &[ScoredName]) -> String {
    candidates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_best(best: &Option<ScoredName>) -> String {
    match best {
        Some(b) => format!("; best candidate was {}", b),
        None => String::new(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No candidate reached the acceptance threshold.
    #[error("no acceptable match for '{query}'{}", describe_best(.best))]
    NotFound {
        query: String,
        best: Option<ScoredName>,
    },

    /// Several candidates are equally good; a human has to pick one with `--url`.
    #[error("'{query}' is ambiguous between: {}", join_candidates(.candidates))]
    Ambiguous {
        query: String,
        candidates: Vec<ScoredName>,
    },

    /// The remote catalog could not be reached or returned an error status.
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// The artist was resolved but has no lyric entries.
    #[error("artist '{artist}' has no entries in the catalog")]
    NoEntries { artist: String },

    /// A model constructor rejected its identity fields.
    #[error("invalid {entity}: {message}")]
    InvalidEntity {
        entity: &'static str,
        message: String,
    },

    /// Reading or writing audio tags failed.
    #[error("tag error for {path}: {message}")]
    Tag { path: PathBuf, message: String },

    /// The report path failed a safety check.
    #[error("refusing to write report to '{path}': {message}")]
    InvalidReport { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(entity: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidEntity {
            entity,
            message: message.into(),
        }
    }

    pub fn tag(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self::Tag {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for errors raised by the network collaborator.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown url>".to_string());
        Self::Fetch {
            url,
            message: err.to_string(),
        }
    }
}
