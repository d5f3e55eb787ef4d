//! Catalog verification of oracle candidates.
//!
//! Each candidate is looked up in the live catalog, fuzzy-matched on title and
//! either accepted with the catalog's canonical metadata or dropped. Lookups
//! stop as soon as enough tracks are accepted.
//!
//! With `parallelism > 1` lookups run in small ordered batches on rayon. A
//! batch never exceeds the number of matches still needed and results are
//! accepted in candidate order, so the output matches a sequential run.

use crate::algorithm::title_similarity;
use crate::error::RecommendError;
use crate::oracle::{CatalogQuery, CatalogSearch, CatalogTrack};
use crate::synthesizer::CandidateTrack;
use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
pub const DEFAULT_MIN_VALID: usize = 4;
/// Upper bound accepted from configuration; matches the largest track count.
pub const MAX_MIN_VALID: usize = 50;
pub const SPOTIFY_EMBED_BASE: &str = "https://open.spotify.com/embed/track/";

/// Catalog results requested per lookup.
const SEARCH_LIMIT: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Titles scoring below this ratio are rejected.
    pub similarity_threshold: f64,
    /// Maximum concurrent lookups. 1 means strictly sequential.
    pub parallelism: usize,
    pub embed_base: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            parallelism: 1,
            embed_base: SPOTIFY_EMBED_BASE.to_string(),
        }
    }
}

/// A candidate confirmed to exist in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrack {
    #[serde(flatten)]
    pub candidate: CandidateTrack,
    pub canonical_title: String,
    pub canonical_artist: String,
    pub external_link: String,
    pub preview_url: String,
    pub external_track_id: String,
    pub external_uri: String,
    pub embed_url: String,
}

impl ResolvedTrack {
    fn dedupe_key(&self) -> &str {
        if self.external_track_id.is_empty() {
            &self.external_link
        } else {
            &self.external_track_id
        }
    }
}

/// Resolves candidates against a [`CatalogSearch`].
pub struct CatalogResolver {
    catalog: Arc<dyn CatalogSearch>,
    config: ResolverConfig,
}

impl CatalogResolver {
    pub fn new(catalog: Arc<dyn CatalogSearch>, config: ResolverConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `candidates` in priority order, returning at most `min_valid`
    /// tracks with distinct catalog ids. Failed candidates are dropped and
    /// never retried; the result may be shorter than `min_valid`.
    pub fn resolve(&self, candidates: &[CandidateTrack], min_valid: usize) -> Vec<ResolvedTrack> {
        let queue: Vec<&CandidateTrack> = candidates
            .iter()
            .filter(|c| !c.title.trim().is_empty())
            .collect();

        let mut accepted: Vec<ResolvedTrack> = Vec::with_capacity(min_valid.min(queue.len()));
        let mut seen = HashSet::new();
        let mut next = 0;
        let width = self.config.parallelism.max(1);

        while accepted.len() < min_valid && next < queue.len() {
            let needed = min_valid - accepted.len();
            let end = (next + width.min(needed)).min(queue.len());
            let batch = &queue[next..end];
            next = end;

            let results: Vec<Result<ResolvedTrack, RecommendError>> = if batch.len() > 1 {
                batch.par_iter().map(|c| self.resolve_one(c)).collect()
            } else {
                batch.iter().map(|c| self.resolve_one(c)).collect()
            };

            for result in results {
                match result {
                    Ok(track) => {
                        if !seen.insert(track.dedupe_key().to_string()) {
                            debug!("Duplicate catalog track '{}', skipping", track.canonical_title);
                            continue;
                        }
                        debug!(
                            "Accepted '{}' as '{}' by {}",
                            track.candidate.title, track.canonical_title, track.canonical_artist
                        );
                        accepted.push(track);
                        if accepted.len() >= min_valid {
                            break;
                        }
                    }
                    Err(e @ RecommendError::CatalogLookup { .. }) => warn!("{e}"),
                    Err(e) => debug!("Dropped candidate: {e}"),
                }
            }
        }

        info!(
            "Resolved {} of {} candidate(s) (attempted {})",
            accepted.len(),
            queue.len(),
            next
        );
        accepted
    }

    /// Look up a single candidate.
    pub fn resolve_one(&self, candidate: &CandidateTrack) -> Result<ResolvedTrack, RecommendError> {
        let title = candidate.title.trim();
        let query = CatalogQuery::with_artist(title, candidate.artist.trim());

        let mut hits = self.search(&query)?;
        if hits.is_empty() && query.artist.is_some() {
            trace!("No hit for '{}', retrying without artist", query.to_query_string());
            hits = self.search(&CatalogQuery::title_only(title))?;
        }

        let hit = hits
            .into_iter()
            .next()
            .filter(|hit| hit.id.is_some() || !hit.external_url.is_empty())
            .ok_or_else(|| RecommendError::CatalogNoMatch {
                title: title.to_string(),
                artist: candidate.artist.clone(),
            })?;

        let ratio = title_similarity(title, &hit.title);
        trace!("Similarity '{}' vs '{}': {ratio:.3}", title, hit.title);
        if ratio < self.config.similarity_threshold {
            return Err(RecommendError::CatalogMismatch {
                candidate: title.to_string(),
                found: hit.title,
                ratio,
            });
        }

        Ok(self.build_track(candidate, hit))
    }

    fn search(&self, query: &CatalogQuery) -> Result<Vec<CatalogTrack>, RecommendError> {
        self.catalog
            .search_tracks(query, SEARCH_LIMIT)
            .map_err(|source| RecommendError::CatalogLookup {
                title: query.title.clone(),
                source,
            })
    }

    fn build_track(&self, candidate: &CandidateTrack, hit: CatalogTrack) -> ResolvedTrack {
        let canonical_artist = hit.main_artist().unwrap_or(candidate.artist.as_str()).to_string();
        let external_track_id = hit.id.unwrap_or_default();
        let embed_url = if external_track_id.is_empty() {
            hit.external_url.clone()
        } else {
            format!("{}{}", self.config.embed_base, external_track_id)
        };

        ResolvedTrack {
            candidate: candidate.clone(),
            canonical_title: hit.title,
            canonical_artist,
            external_link: hit.external_url,
            preview_url: hit.preview_url.unwrap_or_default(),
            external_track_id,
            external_uri: hit.uri.unwrap_or_default(),
            embed_url,
        }
    }
}
