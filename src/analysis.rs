//! Emotion and keyword analysis of user text.
//!
//! [`Analyzer`] calls the two scoring oracles and [`aggregate`] folds their
//! output, together with the situation tag, into an immutable
//! [`AnalysisRecord`].

use crate::algorithm::{clamp_unit, emotion_weights, WeightConfig};
use crate::error::RecommendError;
use crate::oracle::{EmotionOracle, EmotionScores, KeywordOracle, OracleError};
use crate::situation::{classify, Situation};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed candidate labels offered to the emotion oracle, in order.
pub const EMOTION_LABELS: [&str; 7] = ["기쁨", "슬픔", "차분", "에너지", "분노", "설렘", "집중"];

/// Zero-shot hypothesis the emotion oracle fills each label into.
pub const HYPOTHESIS_TEMPLATE: &str = "이 문장의 감정은 {}이다.";

pub const MAX_KEYWORDS: usize = 6;
pub const KEYWORD_NGRAM_RANGE: (usize, usize) = (1, 2);

pub const UNKNOWN_LABEL: &str = "unknown";

/// Identifier used when the top label has no entry in the table.
const FALLBACK_PRIMARY_ID: &str = "chill";

lazy_static::lazy_static! {
    static ref LABEL_IDS: HashMap<&'static str, &'static str> = HashMap::from([
        ("기쁨", "happy"),
        ("슬픔", "sad"),
        ("차분", "chill"),
        ("에너지", "energetic"),
        ("분노", "angry"),
        ("설렘", "romantic"),
        ("집중", "focus"),
    ]);
}

/// External identifier for an emotion label, if it is one of the fixed seven.
#[must_use]
pub fn localize_label(label: &str) -> Option<&'static str> {
    LABEL_IDS.get(label).copied()
}

/// Canonical result of analysing one piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub top1_label: String,
    pub top1_label_localized: String,
    pub top1_score: f64,
    pub top2_label: Option<String>,
    pub top2_label_localized: String,
    pub top2_score: f64,
    pub keywords: Vec<String>,
    pub raw_text: String,
    pub situation: Situation,
    pub weights: Vec<(String, f64)>,
}

impl AnalysisRecord {
    /// Degenerate record for empty input. Downstream stages recommend nothing.
    #[must_use]
    pub fn unknown(raw_text: &str) -> Self {
        Self {
            top1_label: UNKNOWN_LABEL.to_string(),
            top1_label_localized: String::new(),
            top1_score: 1.0,
            top2_label: None,
            top2_label_localized: String::new(),
            top2_score: 0.0,
            keywords: Vec::new(),
            raw_text: raw_text.to_string(),
            situation: Situation::General,
            weights: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.top1_label == UNKNOWN_LABEL
    }

    /// Detected moods with their raw scores, strongest first.
    #[must_use]
    pub fn mood_scores(&self) -> Vec<(String, f64)> {
        let mut moods = vec![(self.top1_label.clone(), self.top1_score)];
        if let Some(label) = &self.top2_label {
            moods.push((label.clone(), self.top2_score));
        }
        moods
    }

    pub fn keywords_csv(&self) -> String {
        self.keywords.join(", ")
    }
}

/// Fold raw oracle output and keywords into an [`AnalysisRecord`].
///
/// Labels are sorted by descending score (ties keep oracle order). The
/// secondary label is kept only above the weight threshold. Scores outside
/// `[0, 1]` are clamped. Empty or whitespace-only text is rejected with
/// [`RecommendError::EmptyInput`]; callers should map it to
/// [`AnalysisRecord::unknown`].
pub fn aggregate(
    scores: &EmotionScores,
    keywords: Vec<String>,
    raw_text: &str,
) -> Result<AnalysisRecord, RecommendError> {
    if raw_text.trim().is_empty() {
        return Err(RecommendError::EmptyInput);
    }

    let mut ranked: Vec<(&str, f64)> = scores
        .labels
        .iter()
        .map(String::as_str)
        .zip(scores.scores.iter().copied().map(clamp_unit))
        .collect();
    ranked.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let Some(&(top1_label, top1_score)) = ranked.first() else {
        return Err(OracleError::InvalidResponse("emotion oracle returned no labels".into()).into());
    };

    let config = WeightConfig::default();
    let top2 = ranked
        .get(1)
        .copied()
        .filter(|(_, score)| config.keeps_secondary(*score));

    let weights = emotion_weights((top1_label, top1_score), top2, &config);
    let situation = classify(raw_text);

    debug!(
        "Aggregated emotions: top1={top1_label} ({top1_score:.2}), top2={:?}, situation={situation}",
        top2.map(|(l, _)| l)
    );

    Ok(AnalysisRecord {
        top1_label: top1_label.to_string(),
        top1_label_localized: localize_label(top1_label)
            .unwrap_or(FALLBACK_PRIMARY_ID)
            .to_string(),
        top1_score,
        top2_label: top2.map(|(label, _)| label.to_string()),
        top2_label_localized: top2
            .and_then(|(label, _)| localize_label(label))
            .unwrap_or_default()
            .to_string(),
        top2_score: top2.map_or(0.0, |(_, score)| score),
        keywords: keywords.into_iter().take(MAX_KEYWORDS).collect(),
        raw_text: raw_text.trim().to_string(),
        situation,
        weights,
    })
}

/// Runs both scoring oracles over a piece of text.
pub struct Analyzer {
    emotion: Arc<dyn EmotionOracle>,
    keywords: Arc<dyn KeywordOracle>,
}

impl Analyzer {
    pub fn new(emotion: Arc<dyn EmotionOracle>, keywords: Arc<dyn KeywordOracle>) -> Self {
        Self { emotion, keywords }
    }

    /// Analyse `text`.
    ///
    /// Empty text never reaches an oracle and yields the unknown record. A
    /// failing keyword oracle only costs the keywords; a failing emotion
    /// oracle is returned as an error since there is nothing to recommend from.
    pub fn analyze(&self, text: &str) -> Result<AnalysisRecord, RecommendError> {
        if text.trim().is_empty() {
            debug!("Empty input, skipping analysis");
            return Ok(AnalysisRecord::unknown(text));
        }

        let scores = self
            .emotion
            .classify_emotion(text, &EMOTION_LABELS, true)?;

        let keywords = match self
            .keywords
            .extract_keywords(text, KEYWORD_NGRAM_RANGE, MAX_KEYWORDS)
        {
            Ok(pairs) => pairs.into_iter().map(|(phrase, _)| phrase).collect(),
            Err(e) => {
                warn!("Keyword extraction failed, continuing without keywords: {e}");
                Vec::new()
            }
        };

        let record = aggregate(&scores, keywords, text)?;
        info!(
            "Analysis: {} / situation {} / {} keyword(s)",
            record.top1_label,
            record.situation,
            record.keywords.len()
        );
        Ok(record)
    }
}
