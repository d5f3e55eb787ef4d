//! Candidate generation through the generative oracle.
//!
//! One analysis record (plus an optional profile) becomes one prompt, one
//! oracle call and one strictly parsed candidate list. Every failure on the
//! way degrades to an empty list; nothing is retried.

use crate::algorithm::{clamp_unit, normalize_title};
use crate::analysis::AnalysisRecord;
use crate::error::RecommendError;
use crate::oracle::GenerativeOracle;
use crate::profile::UserProfile;
use crate::prompt::{build_system_prompt, build_user_prompt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

pub const DEFAULT_TARGET_COUNT: usize = 10;

/// Product-level knobs for candidate generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    pub target_count: usize,
    pub use_profile: bool,
    pub use_situation_policy: bool,
    pub max_tracks_per_artist: usize,
    pub max_favorite_artist_tracks: usize,
}

impl SynthesisConfig {
    /// Config for `n` tracks with artist caps scaled from it.
    #[must_use]
    pub fn for_target_count(n: usize) -> Self {
        let n = n.max(1);
        Self {
            target_count: n,
            use_profile: true,
            use_situation_policy: true,
            max_tracks_per_artist: (n / 5).max(1),
            max_favorite_artist_tracks: (n * 3 / 5).max(1),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self::for_target_count(DEFAULT_TARGET_COUNT)
    }
}

/// A track suggested by the oracle, not yet checked against the catalog.
///
/// Every field is required when decoding an oracle reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub title: String,
    pub artist: String,
    pub reason: String,
    pub mood_tags: Vec<String>,
    pub match_score: f64,
}

#[derive(Deserialize)]
struct CandidateEnvelope {
    tracks: Vec<serde_json::Value>,
}

/// Parse a raw oracle reply into candidates.
///
/// The reply must be a JSON object with a `tracks` array. Array elements that
/// are not complete track objects are skipped, as are entries with a blank
/// title, artist or reason and entries whose reason names the artist. Titles
/// repeating an earlier one (after normalization) are dropped. Order is
/// preserved and the list is cut at `limit`.
pub fn parse_candidates(raw: &str, limit: usize) -> Result<Vec<CandidateTrack>, RecommendError> {
    let envelope: CandidateEnvelope =
        serde_json::from_str(raw.trim()).map_err(|e| RecommendError::OracleParse {
            reason: e.to_string(),
            raw: raw.to_string(),
        })?;

    let mut seen = HashSet::new();
    let candidates = envelope
        .tracks
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<CandidateTrack>(value) {
            Ok(track) => Some(track),
            Err(e) => {
                debug!("Skipping malformed track entry: {e}");
                None
            }
        })
        .map(|mut track| {
            track.title = track.title.trim().to_string();
            track.artist = track.artist.trim().to_string();
            track.reason = track.reason.trim().to_string();
            track.match_score = clamp_unit(track.match_score);
            track
        })
        .filter(|track| {
            let complete =
                !track.title.is_empty() && !track.artist.is_empty() && !track.reason.is_empty();
            if !complete {
                debug!("Skipping incomplete track entry '{}'", track.title);
            }
            complete
        })
        .filter(|track| {
            let named = reason_names_artist(track);
            if named {
                debug!("Skipping '{}': reason mentions {}", track.title, track.artist);
            }
            !named
        })
        .filter(|track| seen.insert(normalize_title(&track.title)))
        .take(limit)
        .collect();

    Ok(candidates)
}

fn reason_names_artist(track: &CandidateTrack) -> bool {
    let artist = normalize_title(&track.artist);
    !artist.is_empty() && normalize_title(&track.reason).contains(&artist)
}

/// Turns analysis records into candidate tracks.
pub struct Synthesizer {
    oracle: Arc<dyn GenerativeOracle>,
    config: SynthesisConfig,
}

impl Synthesizer {
    pub fn new(oracle: Arc<dyn GenerativeOracle>, config: SynthesisConfig) -> Self {
        Self { oracle, config }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Generate candidates for `record`, in oracle priority order.
    ///
    /// The profile is only used when `use_profile` is set. An unknown record
    /// produces no candidates and no oracle call.
    pub fn synthesize(
        &self,
        record: &AnalysisRecord,
        profile: Option<&UserProfile>,
    ) -> Vec<CandidateTrack> {
        if record.is_unknown() {
            debug!("Unknown analysis, nothing to synthesize");
            return Vec::new();
        }

        let profile = profile.filter(|_| self.config.use_profile);
        let system = build_system_prompt(record, profile, &self.config);
        let user = build_user_prompt(record, profile);

        let raw = match self.oracle.complete(&system, &user, true) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Generative oracle call failed: {e}");
                return Vec::new();
            }
        };

        match parse_candidates(&raw, self.config.target_count) {
            Ok(candidates) => {
                info!("Oracle proposed {} candidate(s)", candidates.len());
                candidates
            }
            Err(RecommendError::OracleParse { reason, raw }) => {
                warn!("Unparseable oracle reply ({reason}): {raw}");
                Vec::new()
            }
            Err(e) => {
                warn!("Candidate parsing failed: {e}");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::oracle::{EmotionScores, OracleError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedOracle {
        reply: Result<String, ()>,
        calls: AtomicUsize,
    }

    impl CannedOracle {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl GenerativeOracle for CannedOracle {
        fn complete(
            &self,
            _system_prompt: &str,
            _user_prompt: &str,
            require_json_object: bool,
        ) -> Result<String, OracleError> {
            assert!(require_json_object);
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone().map_err(|_| OracleError::Timeout)
        }
    }

    fn record() -> AnalysisRecord {
        aggregate(&EmotionScores::new(&[("슬픔", 0.7)]), Vec::new(), "우울한 밤").unwrap()
    }

    #[test]
    fn test_config_caps_scale_with_count() {
        let c = SynthesisConfig::for_target_count(20);
        assert_eq!((c.max_tracks_per_artist, c.max_favorite_artist_tracks), (4, 12));
        let c = SynthesisConfig::for_target_count(5);
        assert_eq!((c.max_tracks_per_artist, c.max_favorite_artist_tracks), (1, 3));
        assert_eq!(SynthesisConfig::default().target_count, 10);
    }

    fn entry(title: &str, artist: &str, reason: &str) -> serde_json::Value {
        serde_json::json!({
            "title": title,
            "artist": artist,
            "reason": reason,
            "mood_tags": ["calm"],
            "match_score": 0.7,
        })
    }

    fn reply(entries: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "tracks": entries }).to_string()
    }

    #[test]
    fn test_parse_keeps_order_and_dedupes() {
        let raw = r#"{"tracks": [
            {"title": "밤편지", "artist": "아이유", "reason": "잔잔해요", "mood_tags": ["calm"], "match_score": 0.9},
            {"title": "밤 편지", "artist": "someone", "reason": "dup", "mood_tags": [], "match_score": 0.5},
            {"title": "Square", "artist": "백예린", "reason": "포근해요", "mood_tags": [], "match_score": 1.5},
            {"artist": "no title"},
            "garbage",
            {"title": " Ditto ", "artist": "NewJeans", "reason": "청량해요", "mood_tags": [], "match_score": -0.2}
        ]}"#;
        let tracks = parse_candidates(raw, 10).unwrap();
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["밤편지", "Square", "Ditto"]);
        assert_eq!(tracks[1].match_score, 1.0);
        assert_eq!(tracks[2].match_score, 0.0);
    }

    #[test]
    fn test_parse_requires_every_field() {
        let raw = r#"{"tracks": [
            {"title": "밤편지"},
            {"title": "Square", "artist": "백예린", "reason": "포근해요", "mood_tags": []},
            {"title": "Rain", "artist": "태연", "reason": "촉촉해요", "match_score": 0.6},
            {"title": "Hype Boy", "artist": "", "reason": "", "mood_tags": [], "match_score": 0.6},
            {"title": "Ditto", "artist": "NewJeans", "reason": "청량해요", "mood_tags": [], "match_score": 0.6}
        ]}"#;
        let tracks = parse_candidates(raw, 10).unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Ditto");
    }

    #[test]
    fn test_parse_drops_reason_naming_artist() {
        let raw = reply(vec![
            entry("Ditto", "NewJeans", "NewJeans의 청량한 목소리"),
            entry("Hype Boy", "New Jeans", "newjeans 특유의 리듬"),
            entry("밤편지", "아이유", "잔잔한 피아노가 어울려요"),
        ]);
        let tracks = parse_candidates(&raw, 10).unwrap();
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["밤편지"]);
    }

    #[test]
    fn test_parse_truncates_to_limit() {
        let raw = reply(vec![entry("a", "x", "r"), entry("b", "y", "r"), entry("c", "z", "r")]);
        assert_eq!(parse_candidates(&raw, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_rejects_prose_and_missing_array() {
        for raw in [
            "Here are some songs you might like: 밤편지 by 아이유",
            r#"{"songs": []}"#,
            r#"{"tracks": "none"}"#,
            "",
        ] {
            assert!(
                matches!(parse_candidates(raw, 10), Err(RecommendError::OracleParse { .. })),
                "should reject {raw:?}"
            );
        }
    }

    #[test]
    fn test_synthesize_returns_empty_on_prose() {
        let oracle = Arc::new(CannedOracle::ok("I think you would enjoy some ballads."));
        let synth = Synthesizer::new(oracle.clone(), SynthesisConfig::default());
        assert!(synth.synthesize(&record(), None).is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_synthesize_does_not_retry_failures() {
        let oracle = Arc::new(CannedOracle::failing());
        let synth = Synthesizer::new(oracle.clone(), SynthesisConfig::default());
        assert!(synth.synthesize(&record(), None).is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_record_skips_oracle() {
        let oracle = Arc::new(CannedOracle::ok(r#"{"tracks": [{"title": "a"}]}"#));
        let synth = Synthesizer::new(oracle.clone(), SynthesisConfig::default());
        assert!(synth.synthesize(&AnalysisRecord::unknown(""), None).is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }
}
