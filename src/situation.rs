//! Rule-based situation tagging.
//!
//! Text is lowercased and matched against keyword sets in a fixed priority
//! order: healing, breakup, focus, workout. The first set with a hit wins and
//! anything else is `general`. Distress outranks activity, so "운동해도 너무
//! 힘들어" routes to comfort music rather than a workout mix.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse context used to bias content policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Situation {
    Healing,
    Breakup,
    Focus,
    Workout,
    #[default]
    General,
}

const HEALING_KEYWORDS: &[&str] = &[
    "위로", "힘들", "힘드", "지쳤", "지친", "지쳐", "우울", "외로", "상처", "눈물", "울고", "울었",
    "괴로", "불안", "번아웃", "comfort", "healing", "depressed", "lonely", "exhausted", "burnout",
    "anxious",
];

const BREAKUP_KEYWORDS: &[&str] = &[
    "이별", "헤어졌", "헤어지", "헤어진", "헤어질", "전남친", "전여친", "전 애인", "짝사랑", "차였", "바람피", "breakup",
    "broke up", "break up", "heartbreak", "my ex", "ex-boyfriend", "ex-girlfriend",
];

const FOCUS_KEYWORDS: &[&str] = &[
    "공부", "집중", "시험", "과제", "코딩", "업무", "독서", "마감", "study", "studying",
    "focus", "concentrate", "deadline", "coding", "homework",
];

const WORKOUT_KEYWORDS: &[&str] = &[
    "운동", "헬스", "러닝", "달리기", "조깅", "등산", "스트레칭", "workout", "gym", "running",
    "jogging", "exercise", "cardio",
];

impl Situation {
    /// Priority order in which keyword sets are evaluated.
    pub const PRIORITY: [Situation; 4] = [
        Situation::Healing,
        Situation::Breakup,
        Situation::Focus,
        Situation::Workout,
    ];

    pub const ALL: [Situation; 5] = [
        Situation::Healing,
        Situation::Breakup,
        Situation::Focus,
        Situation::Workout,
        Situation::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Situation::Healing => "healing",
            Situation::Breakup => "breakup",
            Situation::Focus => "focus",
            Situation::Workout => "workout",
            Situation::General => "general",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Situation::Healing => HEALING_KEYWORDS,
            Situation::Breakup => BREAKUP_KEYWORDS,
            Situation::Focus => FOCUS_KEYWORDS,
            Situation::Workout => WORKOUT_KEYWORDS,
            Situation::General => &[],
        }
    }
}

impl fmt::Display for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map raw user text to exactly one situation tag. Never fails.
#[must_use]
pub fn classify(raw_text: &str) -> Situation {
    let normalized = raw_text.to_lowercase();

    Situation::PRIORITY
        .into_iter()
        .find(|situation| {
            situation
                .keywords()
                .iter()
                .any(|keyword| contains_keyword(&normalized, keyword))
        })
        .unwrap_or(Situation::General)
}

/// Korean keywords are stems and match anywhere. English keywords must not
/// be glued to other Latin letters or digits, so "my ex" misses "my exam".
fn contains_keyword(text: &str, keyword: &str) -> bool {
    if !keyword.is_ascii() {
        return text.contains(keyword);
    }
    text.match_indices(keyword).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + keyword.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
