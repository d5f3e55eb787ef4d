//! One chat turn, end to end.
//!
//! [`Recommender`] wires the stages together: analysis, optional profile
//! lookup, candidate synthesis, catalog resolution, reply composition and a
//! fire-and-forget chat log write.

use crate::analysis::{AnalysisRecord, Analyzer};
use crate::chat_log::{ChatLogEntry, ChatLogStore};
use crate::error::RecommendError;
use crate::profile::{ProfileStore, UserProfile};
use crate::resolver::{CatalogResolver, ResolvedTrack, DEFAULT_MIN_VALID};
use crate::synthesizer::Synthesizer;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

/// Tracks listed in the human-readable reply.
pub const REPLY_TRACK_LIMIT: usize = 5;

pub const EMPTY_INPUT_REPLY: &str =
    "메시지가 비어 있어요. 지금 기분이나 있었던 일을 한두 문장으로 적어 주세요.";
pub const NO_MATCH_REPLY: &str =
    "지금은 잘 맞는 곡을 찾지 못했어요. 조금만 더 자세히 상황이나 기분을 적어 주시면 다시 찾아볼게요.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    EmptyInput,
    NoMatch,
    Matched,
}

/// Everything produced for one submitted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    pub status: OutcomeStatus,
    pub analysis: AnalysisRecord,
    pub tracks: Vec<ResolvedTrack>,
    pub reply: String,
}

/// The recommendation pipeline with its collaborators injected.
pub struct Recommender {
    analyzer: Analyzer,
    synthesizer: Synthesizer,
    resolver: CatalogResolver,
    profiles: Option<Arc<dyn ProfileStore>>,
    chat_log: Option<Arc<dyn ChatLogStore>>,
    min_valid: usize,
}

impl Recommender {
    pub fn new(analyzer: Analyzer, synthesizer: Synthesizer, resolver: CatalogResolver) -> Self {
        Self {
            analyzer,
            synthesizer,
            resolver,
            profiles: None,
            chat_log: None,
            min_valid: DEFAULT_MIN_VALID,
        }
    }

    #[must_use]
    pub fn with_profiles(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.profiles = Some(store);
        self
    }

    #[must_use]
    pub fn with_chat_log(mut self, store: Arc<dyn ChatLogStore>) -> Self {
        self.chat_log = Some(store);
        self
    }

    #[must_use]
    pub fn with_min_valid(mut self, min_valid: usize) -> Self {
        self.min_valid = min_valid;
        self
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Run the full pipeline for `text`.
    ///
    /// Failures of the oracles or the catalog degrade into a `NoMatch`
    /// outcome with an explanatory reply. Only fatal errors are returned.
    pub fn recommend(
        &self,
        text: &str,
        user_id: Option<&str>,
    ) -> Result<RecommendationOutcome, RecommendError> {
        if text.trim().is_empty() {
            return Ok(RecommendationOutcome {
                status: OutcomeStatus::EmptyInput,
                analysis: AnalysisRecord::unknown(text),
                tracks: Vec::new(),
                reply: EMPTY_INPUT_REPLY.to_string(),
            });
        }

        let analysis = match self.analyzer.analyze(text) {
            Ok(analysis) => analysis,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Emotion analysis failed, nothing to recommend from: {e}");
                let outcome = RecommendationOutcome {
                    status: OutcomeStatus::NoMatch,
                    analysis: AnalysisRecord::unknown(text),
                    tracks: Vec::new(),
                    reply: NO_MATCH_REPLY.to_string(),
                };
                self.log_turn(text, user_id, &outcome);
                return Ok(outcome);
            }
        };
        let profile = self.load_profile(user_id);
        let candidates = self.synthesizer.synthesize(&analysis, profile.as_ref());
        let tracks = self.resolver.resolve(&candidates, self.min_valid);

        let (status, reply) = if tracks.is_empty() {
            (OutcomeStatus::NoMatch, NO_MATCH_REPLY.to_string())
        } else {
            (OutcomeStatus::Matched, compose_reply(&analysis, &tracks))
        };
        info!(
            "Turn finished: {} candidate(s), {} resolved, status {status:?}",
            candidates.len(),
            tracks.len()
        );

        let outcome = RecommendationOutcome {
            status,
            analysis,
            tracks,
            reply,
        };
        self.log_turn(text, user_id, &outcome);
        Ok(outcome)
    }

    fn load_profile(&self, user_id: Option<&str>) -> Option<UserProfile> {
        if !self.synthesizer.config().use_profile {
            return None;
        }
        let (store, user_id) = (self.profiles.as_ref()?, user_id?);
        match store.load_profile(user_id) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Could not load profile for '{user_id}', continuing without: {e:#}");
                None
            }
        }
    }

    fn log_turn(&self, text: &str, user_id: Option<&str>, outcome: &RecommendationOutcome) {
        let Some(store) = &self.chat_log else {
            return;
        };
        let entry = ChatLogEntry {
            user_id: user_id.map(String::from),
            user_text: text.to_string(),
            reply: outcome.reply.clone(),
            meta: turn_metadata(outcome),
        };
        if let Err(e) = store.save(&entry) {
            warn!("Failed to save chat log: {e:#}");
        }
    }
}

/// Metadata stored alongside a chat turn.
pub fn turn_metadata(outcome: &RecommendationOutcome) -> serde_json::Value {
    json!({
        "mood": outcome.analysis.mood_scores(),
        "keywords_csv": outcome.analysis.keywords_csv(),
        "situation": outcome.analysis.situation,
        "songs": outcome.tracks,
    })
}

/// Human-readable reply for a successful turn.
pub fn compose_reply(analysis: &AnalysisRecord, tracks: &[ResolvedTrack]) -> String {
    let moods = analysis
        .mood_scores()
        .iter()
        .map(|(label, score)| format!("{label}({score:.2})"))
        .collect::<Vec<_>>()
        .join(", ");

    let mut reply = format!("지금 글에서는 {moods} 같은 감정이 느껴져요.\n이런 곡들을 추천해 드릴게요:");
    for track in tracks.iter().take(REPLY_TRACK_LIMIT) {
        let _ = write!(
            reply,
            "\n- {} - {}: {}",
            track.canonical_title, track.canonical_artist, track.candidate.reason
        );
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::oracle::EmotionScores;
    use crate::synthesizer::CandidateTrack;

    fn resolved(title: &str, artist: &str) -> ResolvedTrack {
        ResolvedTrack {
            candidate: CandidateTrack {
                title: title.into(),
                artist: artist.into(),
                reason: "잔잔해서".into(),
                ..Default::default()
            },
            canonical_title: title.into(),
            canonical_artist: artist.into(),
            external_link: String::new(),
            preview_url: String::new(),
            external_track_id: title.into(),
            external_uri: String::new(),
            embed_url: String::new(),
        }
    }

    #[test]
    fn test_compose_reply_lists_at_most_five() {
        let analysis = aggregate(
            &EmotionScores::new(&[("슬픔", 0.7), ("차분", 0.4)]),
            Vec::new(),
            "비가 와",
        )
        .unwrap();
        let tracks: Vec<_> = (0..7).map(|i| resolved(&format!("t{i}"), "a")).collect();

        let reply = compose_reply(&analysis, &tracks);
        assert!(reply.starts_with("지금 글에서는 슬픔(0.70), 차분(0.40) 같은 감정이 느껴져요."));
        assert_eq!(reply.lines().filter(|l| l.starts_with("- ")).count(), 5);
        assert!(reply.contains("- t0 - a: 잔잔해서"));
        assert!(!reply.contains("t5"));
    }

    #[test]
    fn test_turn_metadata_shape() {
        let analysis = aggregate(&EmotionScores::new(&[("집중", 0.8)]), vec!["공부".into(), "밤".into()], "공부 중")
            .unwrap();
        let outcome = RecommendationOutcome {
            status: OutcomeStatus::Matched,
            analysis,
            tracks: vec![resolved("Lofi", "b")],
            reply: String::new(),
        };
        let meta = turn_metadata(&outcome);
        assert_eq!(meta["keywords_csv"], "공부, 밤");
        assert_eq!(meta["situation"], "focus");
        assert_eq!(meta["mood"][0][0], "집중");
        assert_eq!(meta["songs"][0]["canonical_title"], "Lofi");
        assert_eq!(meta["songs"][0]["reason"], "잔잔해서");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(OutcomeStatus::NoMatch).unwrap(),
            json!("no_match")
        );
    }
}
