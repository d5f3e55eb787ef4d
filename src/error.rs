//! Typed errors for the recommendation core.
//!
//! Almost every variant here is absorbed inside the pipeline and degrades to a
//! smaller or empty result set. Only [`RecommendError::Configuration`] is fatal,
//! and it is raised before any request is served.

use crate::oracle::OracleError;
use thiserror::Error;

/// Errors produced while turning a piece of text into recommendations.
#[derive(Debug, Error)]
pub enum RecommendError {
    /// The submitted text was empty or whitespace only.
    #[error("Input text is empty")]
    EmptyInput,

    /// The generative oracle replied with something that is not the expected JSON object.
    #[error("Generative oracle reply could not be parsed: {reason}")]
    OracleParse { reason: String, raw: String },

    /// An oracle call failed at the transport or API level.
    #[error("Oracle call failed: {0}")]
    Oracle(#[from] OracleError),

    /// The catalog search failed for a single candidate.
    #[error("Catalog lookup failed for '{title}': {source}")]
    CatalogLookup {
        title: String,
        #[source]
        source: OracleError,
    },

    /// The catalog had nothing usable for the candidate.
    #[error("No catalog match for '{title}' ({artist})")]
    CatalogNoMatch { title: String, artist: String },

    /// The catalog returned a track whose title is too far from the candidate's.
    #[error("Catalog title '{found}' does not match '{candidate}' (ratio {ratio:.2})")]
    CatalogMismatch {
        candidate: String,
        found: String,
        ratio: f64,
    },

    /// Required credentials or endpoints are missing.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RecommendError {
    /// Whether this error stops the process instead of degrading a single request.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecommendError::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(RecommendError::Configuration("OPENAI_API_KEY".into()).is_fatal());
        assert!(!RecommendError::EmptyInput.is_fatal());
        assert!(!RecommendError::CatalogMismatch {
            candidate: "a".into(),
            found: "b".into(),
            ratio: 0.1,
        }
        .is_fatal());
        assert!(!RecommendError::Oracle(OracleError::Timeout).is_fatal());
    }

    #[test]
    fn test_mismatch_message_formats_ratio() {
        let err = RecommendError::CatalogMismatch {
            candidate: "눈물".into(),
            found: "눈물참기".into(),
            ratio: 0.5,
        };
        assert_eq!(
            err.to_string(),
            "Catalog title '눈물참기' does not match '눈물' (ratio 0.50)"
        );
    }
}
