//! Scoring oracles served over HTTP.
//!
//! [`ZeroShotClient`] speaks the Hugging Face inference API for
//! zero-shot-classification pipelines. [`KeyphraseClient`] talks to a small
//! KeyBERT-style sidecar that returns `[phrase, relevance]` pairs.

use super::{check_status, http_client};
use crate::analysis::HYPOTHESIS_TEMPLATE;
use crate::oracle::{EmotionOracle, EmotionScores, KeywordOracle, OracleError};
use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EMOTION_ORACLE_URL: &str =
    "https://api-inference.huggingface.co/models/MoritzLaurer/mDeBERTa-v3-base-mnli-xnli";

#[derive(Debug, Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
}

#[derive(Debug, Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
    multi_label: bool,
    hypothesis_template: &'a str,
}

#[derive(Debug, Deserialize)]
struct LabelScore {
    label: String,
    score: f64,
}

/// The pipeline answers either with aligned arrays or with a list of pairs,
/// depending on the serving stack.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Aligned { labels: Vec<String>, scores: Vec<f64> },
    Pairs(Vec<LabelScore>),
}

/// Decode a zero-shot-classification reply.
pub fn parse_zero_shot(body: &str) -> Result<EmotionScores, OracleError> {
    let response: ZeroShotResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

    let scores = match response {
        ZeroShotResponse::Aligned { labels, scores } => {
            if labels.len() != scores.len() {
                return Err(OracleError::InvalidResponse(format!(
                    "{} labels but {} scores",
                    labels.len(),
                    scores.len()
                )));
            }
            EmotionScores { labels, scores }
        }
        ZeroShotResponse::Pairs(pairs) => {
            let (labels, scores) = pairs.into_iter().map(|p| (p.label, p.score)).unzip();
            EmotionScores { labels, scores }
        }
    };
    Ok(scores)
}

pub struct ZeroShotClient {
    client: Client,
    url: String,
    api_token: Option<String>,
}

impl ZeroShotClient {
    pub fn new(
        url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
            api_token: api_token.filter(|t| !t.is_empty()),
        })
    }
}

impl EmotionOracle for ZeroShotClient {
    fn classify_emotion(
        &self,
        text: &str,
        candidate_labels: &[&str],
        multi_label: bool,
    ) -> Result<EmotionScores, OracleError> {
        let request = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters {
                candidate_labels,
                multi_label,
                hypothesis_template: HYPOTHESIS_TEMPLATE,
            },
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }
        let response = check_status(builder.send()?)?;
        let scores = parse_zero_shot(&response.text()?)?;
        debug!("Emotion oracle returned {} label(s)", scores.labels.len());
        Ok(scores)
    }
}

#[derive(Debug, Serialize)]
struct KeyphraseRequest<'a> {
    text: &'a str,
    keyphrase_ngram_range: [usize; 2],
    top_n: usize,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KeyphraseResponse {
    Wrapped { keywords: Vec<(String, f64)> },
    Bare(Vec<(String, f64)>),
}

/// Decode a keyphrase reply, keeping the server's relevance order.
pub fn parse_keyphrases(body: &str) -> Result<Vec<(String, f64)>, OracleError> {
    let response: KeyphraseResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
    let pairs = match response {
        KeyphraseResponse::Wrapped { keywords } => keywords,
        KeyphraseResponse::Bare(pairs) => pairs,
    };
    Ok(pairs
        .into_iter()
        .map(|(phrase, score)| (phrase.trim().to_string(), score))
        .filter(|(phrase, _)| !phrase.is_empty())
        .collect())
}

pub struct KeyphraseClient {
    client: Client,
    url: String,
}

impl KeyphraseClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

impl KeywordOracle for KeyphraseClient {
    fn extract_keywords(
        &self,
        text: &str,
        ngram_range: (usize, usize),
        top_n: usize,
    ) -> Result<Vec<(String, f64)>, OracleError> {
        let request = KeyphraseRequest {
            text,
            keyphrase_ngram_range: [ngram_range.0, ngram_range.1],
            top_n,
        };
        let response = check_status(self.client.post(&self.url).json(&request).send()?)?;
        let mut phrases = parse_keyphrases(&response.text()?)?;
        phrases.truncate(top_n);
        Ok(phrases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aligned_zero_shot() {
        let body = r#"{"sequence": "비가 와", "labels": ["슬픔", "차분"], "scores": [0.7, 0.4]}"#;
        let scores = parse_zero_shot(body).unwrap();
        assert_eq!(scores, EmotionScores::new(&[("슬픔", 0.7), ("차분", 0.4)]));
    }

    #[test]
    fn test_parse_pair_zero_shot() {
        let body = r#"[{"label": "기쁨", "score": 0.9}, {"label": "설렘", "score": 0.3}]"#;
        let scores = parse_zero_shot(body).unwrap();
        assert_eq!(scores.labels, vec!["기쁨", "설렘"]);
        assert_eq!(scores.scores, vec![0.9, 0.3]);
    }

    #[test]
    fn test_misaligned_zero_shot_is_invalid() {
        let body = r#"{"labels": ["a", "b"], "scores": [0.1]}"#;
        assert!(matches!(parse_zero_shot(body), Err(OracleError::InvalidResponse(_))));
        assert!(parse_zero_shot(r#"{"error": "loading"}"#).is_err());
    }

    #[test]
    fn test_zero_shot_request_shape() {
        let labels = ["기쁨", "슬픔"];
        let request = ZeroShotRequest {
            inputs: "hi",
            parameters: ZeroShotParameters {
                candidate_labels: &labels,
                multi_label: true,
                hypothesis_template: HYPOTHESIS_TEMPLATE,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["parameters"]["candidate_labels"][1], "슬픔");
        assert_eq!(json["parameters"]["hypothesis_template"], "이 문장의 감정은 {}이다.");
    }

    #[test]
    fn test_parse_keyphrases() {
        let bare = r#"[["비", 0.61], [" 마음 ", 0.52], ["", 0.1]]"#;
        assert_eq!(
            parse_keyphrases(bare).unwrap(),
            vec![("비".to_string(), 0.61), ("마음".to_string(), 0.52)]
        );

        let wrapped = r#"{"keywords": [["공부", 0.8]]}"#;
        assert_eq!(parse_keyphrases(wrapped).unwrap().len(), 1);
    }
}
