//! User taste profiles and the survey they are built from.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub const MAX_NOVELTY: u8 = 10;
pub const MAX_FAVORITE_ARTISTS: usize = 3;

/// Era preference collected by the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YearCategory {
    #[serde(rename = "1990s")]
    Nineties,
    #[serde(rename = "2000s")]
    TwoThousands,
    #[serde(rename = "2010s")]
    TwentyTens,
    #[serde(rename = "2020s")]
    TwentyTwenties,
    #[serde(rename = "ALL")]
    All,
}

impl YearCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            YearCategory::Nineties => "1990s",
            YearCategory::TwoThousands => "2000s",
            YearCategory::TwentyTens => "2010s",
            YearCategory::TwentyTwenties => "2020s",
            YearCategory::All => "ALL",
        }
    }
}

impl fmt::Display for YearCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YearCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "1990s" => Ok(YearCategory::Nineties),
            "2000s" => Ok(YearCategory::TwoThousands),
            "2010s" => Ok(YearCategory::TwentyTens),
            "2020s" => Ok(YearCategory::TwentyTwenties),
            all if all.eq_ignore_ascii_case("all") => Ok(YearCategory::All),
            other => bail!("Unknown year category '{other}' (expected 1990s, 2000s, 2010s, 2020s or ALL)"),
        }
    }
}

/// One ranked favorite artist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteArtist {
    pub rank: u8,
    pub name: String,
    pub external_id: Option<String>,
}

/// Taste preferences for one user. Read-only for the recommendation core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub novelty_score: Option<u8>,
    pub preferred_year_category: Option<String>,
    pub favorite_genres: BTreeSet<String>,
    pub favorite_artists: Vec<FavoriteArtist>,
}

impl UserProfile {
    /// Profile for a user who never answered the survey.
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            ..Default::default()
        }
    }

    /// True when no preference at all is known.
    pub fn is_blank(&self) -> bool {
        self.novelty_score.is_none()
            && self.preferred_year_category.is_none()
            && self.favorite_genres.is_empty()
            && self.favorite_artists.is_empty()
    }
}

/// A submitted taste survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub user_id: String,
    pub novelty: u8,
    #[serde(rename = "yearCategory")]
    pub year_category: YearCategory,
    pub genres: Vec<String>,
    pub favorite_artists: Vec<String>,
}

impl SurveyResponse {
    /// Check ranges before the survey is stored.
    pub fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            bail!("Survey user id must not be empty");
        }
        if self.novelty > MAX_NOVELTY {
            bail!("Novelty must be between 0 and {MAX_NOVELTY}, got {}", self.novelty);
        }
        let artists = self.cleaned_artists();
        if artists.len() > MAX_FAVORITE_ARTISTS {
            bail!(
                "At most {MAX_FAVORITE_ARTISTS} favorite artists are allowed, got {}",
                artists.len()
            );
        }
        Ok(())
    }

    fn cleaned_artists(&self) -> Vec<&str> {
        self.favorite_artists
            .iter()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .collect()
    }

    /// The profile this survey implies. Artists are ranked in answer order.
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            user_id: self.user_id.clone(),
            novelty_score: Some(self.novelty.min(MAX_NOVELTY)),
            preferred_year_category: Some(self.year_category.to_string()),
            favorite_genres: self
                .genres
                .iter()
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty())
                .collect(),
            favorite_artists: self
                .cleaned_artists()
                .into_iter()
                .take(MAX_FAVORITE_ARTISTS)
                .zip(1u8..)
                .map(|(name, rank)| FavoriteArtist {
                    rank,
                    name: name.to_string(),
                    external_id: None,
                })
                .collect(),
        }
    }
}

/// Source of user profiles and sink for survey answers.
pub trait ProfileStore: Send + Sync {
    /// Latest profile for `user_id`; all optional fields unset if unknown.
    fn load_profile(&self, user_id: &str) -> Result<UserProfile>;

    fn save_survey(&self, survey: &SurveyResponse) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn survey() -> SurveyResponse {
        SurveyResponse {
            user_id: "u1".into(),
            novelty: 8,
            year_category: YearCategory::TwentyTens,
            genres: vec!["ballad".into(), " indie ".into(), "".into()],
            favorite_artists: vec!["아이유".into(), " ".into(), "검정치마".into()],
        }
    }

    #[test]
    fn test_survey_to_profile_ranks_artists() {
        let profile = survey().to_profile();
        assert_eq!(profile.novelty_score, Some(8));
        assert_eq!(profile.preferred_year_category.as_deref(), Some("2010s"));
        assert_eq!(
            profile.favorite_genres.iter().cloned().collect::<Vec<_>>(),
            vec!["ballad", "indie"]
        );
        assert_eq!(profile.favorite_artists.len(), 2);
        assert_eq!(profile.favorite_artists[0].rank, 1);
        assert_eq!(profile.favorite_artists[1].name, "검정치마");
        assert_eq!(profile.favorite_artists[1].rank, 2);
        assert!(profile.favorite_artists.iter().all(|a| a.external_id.is_none()));
    }

    #[test]
    fn test_survey_validation() {
        assert!(survey().validate().is_ok());

        let too_novel = SurveyResponse { novelty: 11, ..survey() };
        assert!(too_novel.validate().is_err());

        let too_many = SurveyResponse {
            favorite_artists: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..survey()
        };
        assert!(too_many.validate().is_err());

        let anonymous = SurveyResponse { user_id: " ".into(), ..survey() };
        assert!(anonymous.validate().is_err());
    }

    #[test]
    fn test_year_category_parsing() {
        assert_eq!("2020s".parse::<YearCategory>().unwrap(), YearCategory::TwentyTwenties);
        assert_eq!("all".parse::<YearCategory>().unwrap(), YearCategory::All);
        assert!("1980s".parse::<YearCategory>().is_err());
    }

    #[test]
    fn test_survey_json_uses_camel_case_year() {
        let json = serde_json::to_value(survey()).unwrap();
        assert_eq!(json["yearCategory"], "2010s");
    }

    #[test]
    fn test_empty_profile_is_blank() {
        let profile = UserProfile::empty("nobody");
        assert!(profile.is_blank());
        assert_eq!(profile.user_id, "nobody");
        assert!(!survey().to_profile().is_blank());
    }
}
