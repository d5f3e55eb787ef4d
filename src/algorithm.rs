//! Pure numeric helpers for mood weighting and catalog matching.
//!
//! Everything here is deterministic and side-effect free, so the aggregation
//! and resolution stages can be tested without any oracle.

use strsim::normalized_levenshtein;

/// Parameters for turning the top two emotion scores into blend weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightConfig {
    pub primary_weight: f64,
    pub secondary_weight: f64,
    /// A secondary label only counts when its score is strictly above this.
    pub secondary_threshold: f64,
    pub decimals: i32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            primary_weight: 0.6,
            secondary_weight: 0.4,
            secondary_threshold: 0.2,
            decimals: 2,
        }
    }
}

impl WeightConfig {
    /// Whether a secondary score is strong enough to be kept.
    #[must_use]
    pub fn keeps_secondary(&self, score: f64) -> bool {
        score > self.secondary_threshold
    }
}

/// Round to a fixed number of decimals, halves away from zero.
///
/// # Examples
///
/// ```
/// use moodtune::algorithm::round_to;
///
/// assert_eq!(round_to(0.498, 2), 0.5);
/// assert_eq!(round_to(0.125, 1), 0.1);
/// ```
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Compute the weight list for a primary and optional secondary label.
///
/// The primary entry is always present. The secondary entry is added only
/// when its score passes the threshold, so a weak second emotion never
/// dilutes the blend.
///
/// # Examples
///
/// ```
/// use moodtune::algorithm::{emotion_weights, WeightConfig};
///
/// let weights = emotion_weights(("슬픔", 0.7), Some(("차분", 0.4)), &WeightConfig::default());
/// assert_eq!(weights, vec![("슬픔".to_string(), 0.42), ("차분".to_string(), 0.16)]);
/// ```
#[must_use]
pub fn emotion_weights(
    primary: (&str, f64),
    secondary: Option<(&str, f64)>,
    config: &WeightConfig,
) -> Vec<(String, f64)> {
    let (label, score) = primary;
    let mut weights = vec![(
        label.to_string(),
        round_to(config.primary_weight * score, config.decimals),
    )];

    if let Some((label, score)) = secondary.filter(|(_, s)| config.keeps_secondary(*s)) {
        weights.push((
            label.to_string(),
            round_to(config.secondary_weight * score, config.decimals),
        ));
    }

    weights
}

/// Lowercase and strip every whitespace character.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Edit-distance similarity of two titles after normalization, in `[0, 1]`.
///
/// Two titles that both normalize to the empty string are treated as identical.
#[must_use]
pub fn title_similarity(candidate: &str, found: &str) -> f64 {
    normalized_levenshtein(&normalize_title(candidate), &normalize_title(found))
}

/// Clamp a model-supplied score into `[0, 1]`, mapping NaN to zero.
#[inline]
#[must_use]
pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_pins_half_away_from_zero() {
        assert_eq!(round_to(0.6 * 0.83, 2), 0.5);
        assert_eq!(round_to(0.6 * 0.835, 2), 0.5);
        assert_eq!(round_to(0.6 * 0.7, 2), 0.42);
        assert_eq!(round_to(0.4 * 0.4, 2), 0.16);
        assert_eq!(round_to(2.5, 0), 3.0);
    }

    #[test]
    fn test_secondary_below_threshold_is_dropped() {
        let config = WeightConfig::default();
        let weights = emotion_weights(("기쁨", 0.9), Some(("설렘", 0.2)), &config);
        assert_eq!(weights.len(), 1, "0.2 is not strictly above the threshold");

        let weights = emotion_weights(("기쁨", 0.9), None, &config);
        assert_eq!(weights, vec![("기쁨".to_string(), 0.54)]);
    }

    #[test]
    fn test_secondary_just_above_threshold_is_kept() {
        let weights = emotion_weights(("분노", 0.5), Some(("에너지", 0.21)), &WeightConfig::default());
        assert_eq!(weights.len(), 2);
        assert_eq!(weights[1], ("에너지".to_string(), 0.08));
    }

    #[test]
    fn test_weights_stay_in_unit_range() {
        let config = WeightConfig::default();
        for i in 0..=100 {
            let s = f64::from(i) / 100.0;
            for (_, w) in emotion_weights(("a", s), Some(("b", s)), &config) {
                assert!((0.0..=1.0).contains(&w));
            }
        }
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("  Hype Boy "), "hypeboy");
        assert_eq!(normalize_title("밤 편지"), "밤편지");
        assert_eq!(normalize_title("\tA\nB"), "ab");
    }

    #[test]
    fn test_similarity_drops_partial_title() {
        let ratio = title_similarity("눈물", "눈물참기");
        assert!((ratio - 0.5).abs() < 1e-9, "got {ratio}");
        assert!(ratio < 0.7);
    }

    #[test]
    fn test_similarity_ignores_case_and_spacing() {
        assert_eq!(title_similarity("Love Dive", "LOVE DIVE"), 1.0);
        assert_eq!(title_similarity("밤편지", "밤 편지"), 1.0);
        assert_eq!(title_similarity("", " "), 1.0);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(1.7), 1.0);
        assert_eq!(clamp_unit(-0.2), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(0.35), 0.35);
    }
}
