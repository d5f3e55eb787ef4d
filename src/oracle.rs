//! Contracts for the external services the core depends on.
//!
//! The core never talks to a vendor directly. Each stage receives one of these
//! traits as a constructor parameter, which keeps the deterministic parts
//! (aggregation, prompt building, parsing, matching) testable with stubs.
//! Concrete HTTP adapters live in [`crate::clients`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling an oracle or the catalog.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Request timeout")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OracleError::Timeout
        } else if e.is_decode() {
            OracleError::InvalidResponse(e.to_string())
        } else {
            OracleError::Transport(e.to_string())
        }
    }
}

/// Raw output of the zero-shot emotion oracle: aligned labels and scores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

impl EmotionScores {
    pub fn new(pairs: &[(&str, f64)]) -> Self {
        Self {
            labels: pairs.iter().map(|(label, _)| (*label).to_string()).collect(),
            scores: pairs.iter().map(|(_, score)| *score).collect(),
        }
    }
}

/// Scores text against a fixed set of candidate emotion labels.
pub trait EmotionOracle: Send + Sync {
    fn classify_emotion(
        &self,
        text: &str,
        candidate_labels: &[&str],
        multi_label: bool,
    ) -> Result<EmotionScores, OracleError>;
}

/// Extracts salient key phrases, most relevant first.
pub trait KeywordOracle: Send + Sync {
    fn extract_keywords(
        &self,
        text: &str,
        ngram_range: (usize, usize),
        top_n: usize,
    ) -> Result<Vec<(String, f64)>, OracleError>;
}

/// Produces free text from a system and a user turn.
///
/// With `require_json_object` set, implementations must ask the backend for a
/// single JSON object and nothing else.
pub trait GenerativeOracle: Send + Sync {
    fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        require_json_object: bool,
    ) -> Result<String, OracleError>;
}

/// A structured track search: title, optionally narrowed to one artist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub title: String,
    pub artist: Option<String>,
}

impl CatalogQuery {
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: None,
        }
    }

    pub fn with_artist(title: impl Into<String>, artist: impl Into<String>) -> Self {
        let artist = artist.into();
        Self {
            title: title.into(),
            artist: (!artist.trim().is_empty()).then_some(artist),
        }
    }

    /// Field-filter query string understood by the catalog search endpoint.
    pub fn to_query_string(&self) -> String {
        match &self.artist {
            Some(artist) => format!("track:{} artist:{}", self.title, artist),
            None => self.title.clone(),
        }
    }
}

/// Artist entry on a catalog track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub name: String,
}

/// A track as returned by the catalog search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub title: String,
    pub artists: Vec<CatalogArtist>,
    pub external_url: String,
    pub preview_url: Option<String>,
    pub id: Option<String>,
    pub uri: Option<String>,
}

impl CatalogTrack {
    /// First credited artist, if any.
    pub fn main_artist(&self) -> Option<&str> {
        self.artists.first().map(|a| a.name.as_str())
    }
}

/// Track search against the live music catalog. Results are tracks only.
pub trait CatalogSearch: Send + Sync {
    fn search_tracks(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, OracleError>;
}
