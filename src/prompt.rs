//! Prompt construction for the generative oracle.
//!
//! The system turn carries the output contract and content policy; the user
//! turn carries the text, the analysis record and, when enabled, the profile.

use crate::analysis::AnalysisRecord;
use crate::profile::UserProfile;
use crate::situation::Situation;
use crate::synthesizer::SynthesisConfig;
use serde_json::json;

/// Novelty at or above this leans towards lesser-known tracks.
pub const HIGH_NOVELTY: u8 = 7;
/// Novelty at or below this leans towards mainstream tracks.
pub const LOW_NOVELTY: u8 = 3;
/// Distinct genres the output must span, whatever the profile lists.
const MIN_GENRE_SPREAD: usize = 2;
/// Upper bound on the required spread.
const MAX_GENRE_SPREAD: usize = 3;

const ROLE: &str = "너는 사용자의 글에서 드러난 감정과 상황에 맞춰 노래를 추천하는 음악 큐레이터야.\n\
입력으로 사용자의 원문과 감정 분석 결과(JSON)가 주어진다.\n\
- emotion.top1_label / top2_label: 가장 강한 감정과 두 번째 감정\n\
- emotion.weights: 감정별 반영 비율\n\
- emotion.keywords: 글의 핵심 키워드\n\
- emotion.situation: healing, breakup, focus, workout, general 중 하나\n";

const OUTPUT_FORMAT: &str = "반드시 아래 형식의 JSON 객체 하나만 출력해. 설명이나 다른 텍스트는 절대 쓰지 마.\n\
{\"tracks\": [{\"title\": \"곡 제목\", \"artist\": \"아티스트\", \"reason\": \"추천 이유\", \
\"mood_tags\": [\"태그\"], \"match_score\": 0.0}]}\n\
- title, artist, reason, mood_tags, match_score 필드는 모든 곡에 필수다.\n\
- match_score는 0과 1 사이의 숫자다.\n\
- reason은 한국어 한두 문장으로 쓰고, 아티스트 이름을 언급하지 마.\n\
- 실제로 존재하는 곡만 추천하고, 같은 제목의 곡을 두 번 넣지 마.\n";

/// Content rule for a situation, if it has one.
#[must_use]
pub fn situation_policy(situation: Situation) -> Option<&'static str> {
    match situation {
        Situation::Healing => Some(
            "상황이 healing이다. 위로가 되고 희망적인 분위기의 곡을 우선하고, \
상실이나 죽음을 다루는 가사의 곡은 피해.",
        ),
        Situation::Breakup => Some(
            "상황이 breakup이다. 이별의 아픔을 다룬 곡은 괜찮지만, \
자해나 삶을 포기하는 내용을 담은 곡은 절대 추천하지 마.",
        ),
        Situation::Focus => Some(
            "상황이 focus다. 자극이 적고 반복해서 틀어 두기 좋은 잔잔한 곡을 우선해.",
        ),
        Situation::Workout => Some(
            "상황이 workout이다. 템포가 빠르고 에너지가 높은 곡을 우선해.",
        ),
        Situation::General => None,
    }
}

/// Taste-blending rules for a profile. Empty when the profile says nothing.
#[must_use]
pub fn taste_policy(profile: &UserProfile, config: &SynthesisConfig) -> Vec<String> {
    let n = config.target_count;
    let mut rules = Vec::new();

    match profile.novelty_score {
        Some(score) if score >= HIGH_NOVELTY => {
            rules.push("새로운 음악을 원하는 사용자다. 덜 알려진 곡과 아티스트를 적극적으로 섞어.".to_string())
        }
        Some(score) if score <= LOW_NOVELTY => {
            rules.push("익숙한 음악을 선호하는 사용자다. 대중적으로 잘 알려진 곡 위주로 골라.".to_string())
        }
        _ => {}
    }

    if !profile.favorite_genres.is_empty() {
        let genres: Vec<&str> = profile.favorite_genres.iter().map(String::as_str).collect();
        let spread = genres.len().clamp(MIN_GENRE_SPREAD, MAX_GENRE_SPREAD);
        rules.push(format!(
            "선호 장르({})를 반영하되 최소 {spread}개의 서로 다른 장르를 포함하고, {n}곡 전부를 한 장르로 채우지 마.",
            genres.join(", ")
        ));
    }

    if !profile.favorite_artists.is_empty() {
        let artists: Vec<&str> = profile
            .favorite_artists
            .iter()
            .map(|a| a.name.as_str())
            .collect();
        rules.push(format!(
            "좋아하는 아티스트({})의 곡은 아티스트당 최대 {}곡, 합계 최대 {}곡까지만 넣고 나머지는 다른 아티스트로 채워.",
            artists.join(", "),
            config.max_tracks_per_artist,
            config.max_favorite_artist_tracks
        ));
    }

    if let Some(year) = profile
        .preferred_year_category
        .as_deref()
        .filter(|y| !y.eq_ignore_ascii_case("ALL"))
    {
        rules.push(format!("주로 {year}에 발표된 곡으로 골라."));
    }

    rules
}

/// Build the system turn.
#[must_use]
pub fn build_system_prompt(
    record: &AnalysisRecord,
    profile: Option<&UserProfile>,
    config: &SynthesisConfig,
) -> String {
    let mut prompt = String::from(ROLE);
    if profile.is_some() {
        prompt.push_str("- user_profile: 사용자의 음악 취향 정보\n");
    }
    prompt.push('\n');
    prompt.push_str(&format!(
        "감정 비율과 키워드를 함께 고려해서 정확히 {}곡을 추천해.\n",
        config.target_count
    ));
    prompt.push_str(OUTPUT_FORMAT);

    if config.use_situation_policy {
        if let Some(rule) = situation_policy(record.situation) {
            prompt.push_str("\n[상황 규칙]\n");
            prompt.push_str(rule);
            prompt.push('\n');
        }
    }

    if let Some(profile) = profile {
        let rules = taste_policy(profile, config);
        if !rules.is_empty() {
            prompt.push_str("\n[취향 규칙]\n");
            for rule in rules {
                prompt.push_str("- ");
                prompt.push_str(&rule);
                prompt.push('\n');
            }
        }
    }

    prompt
}

/// Build the user turn: the raw text followed by the analysis payload.
#[must_use]
pub fn build_user_prompt(record: &AnalysisRecord, profile: Option<&UserProfile>) -> String {
    let mut payload = json!({ "emotion": record });
    if let Some(profile) = profile {
        payload["user_profile"] = json!(profile);
    }
    let pretty = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
    format!("사용자 글:\n{}\n\n분석 결과:\n{pretty}", record.raw_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::oracle::EmotionScores;
    use crate::profile::FavoriteArtist;

    fn record(text: &str) -> AnalysisRecord {
        aggregate(&EmotionScores::new(&[("슬픔", 0.7), ("차분", 0.4)]), vec!["비".into()], text).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile {
            user_id: "u1".into(),
            novelty_score: Some(9),
            preferred_year_category: Some("2010s".into()),
            favorite_genres: ["ballad".to_string(), "indie".to_string()].into_iter().collect(),
            favorite_artists: vec![FavoriteArtist {
                rank: 1,
                name: "아이유".into(),
                external_id: None,
            }],
        }
    }

    #[test]
    fn test_system_prompt_states_count_and_format() {
        let config = SynthesisConfig::for_target_count(15);
        let prompt = build_system_prompt(&record("그냥 그래"), None, &config);
        assert!(prompt.contains("정확히 15곡"));
        assert!(prompt.contains("\"tracks\""));
        assert!(prompt.contains("match_score"));
        assert!(!prompt.contains("[상황 규칙]"), "general has no situation rule");
        assert!(!prompt.contains("[취향 규칙]"));
    }

    #[test]
    fn test_situation_policy_toggle() {
        let healing = record("너무 지쳤어");
        let on = build_system_prompt(&healing, None, &SynthesisConfig::default());
        assert!(on.contains("상실이나 죽음"));

        let config = SynthesisConfig {
            use_situation_policy: false,
            ..SynthesisConfig::default()
        };
        let off = build_system_prompt(&healing, None, &config);
        assert!(!off.contains("[상황 규칙]"));
    }

    #[test]
    fn test_breakup_policy_forbids_self_harm() {
        let rule = situation_policy(Situation::Breakup).unwrap();
        assert!(rule.contains("자해"));
        assert!(situation_policy(Situation::General).is_none());
    }

    #[test]
    fn test_taste_policy_rules() {
        let config = SynthesisConfig::for_target_count(20);
        let rules = taste_policy(&profile(), &config);
        assert_eq!(rules.len(), 4);
        assert!(rules[0].contains("덜 알려진"));
        assert!(rules[1].contains("최소 2개"));
        assert!(rules[2].contains("아티스트당 최대 4곡, 합계 최대 12곡"));
        assert!(rules[3].contains("2010s"));
    }

    #[test]
    fn test_single_genre_still_requires_variety() {
        let profile = UserProfile {
            favorite_genres: ["indie".to_string()].into_iter().collect(),
            ..UserProfile::empty("u3")
        };
        let rules = taste_policy(&profile, &SynthesisConfig::default());
        assert_eq!(rules.len(), 1);
        assert!(rules[0].contains("선호 장르(indie)"));
        assert!(rules[0].contains("최소 2개"));
        assert!(!rules[0].contains("최소 1개"));

        let many = UserProfile {
            favorite_genres: ["a", "b", "c", "d", "e"].iter().map(|g| g.to_string()).collect(),
            ..UserProfile::empty("u4")
        };
        assert!(taste_policy(&many, &SynthesisConfig::default())[0].contains("최소 3개"));
    }

    #[test]
    fn test_taste_policy_all_years_and_mainstream() {
        let profile = UserProfile {
            novelty_score: Some(2),
            preferred_year_category: Some("ALL".into()),
            ..UserProfile::empty("u2")
        };
        let rules = taste_policy(&profile, &SynthesisConfig::default());
        assert_eq!(rules.len(), 1);
        assert!(rules[0].contains("대중적"));
    }

    #[test]
    fn test_user_prompt_embeds_payload() {
        let rec = record("비가 와서 마음이 조금 가라앉았어.");
        let prompt = build_user_prompt(&rec, Some(&profile()));
        assert!(prompt.starts_with("사용자 글:\n비가 와서"));
        assert!(prompt.contains("\"top1_label\": \"슬픔\""));
        assert!(prompt.contains("\"user_profile\""));

        let without = build_user_prompt(&rec, None);
        assert!(!without.contains("user_profile"));
    }
}
