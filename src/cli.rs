//! # Command-Line Interface
//!
//! Clap definitions for the `moodtune` binary.
//!
//! ## Commands
//!
//! - `analyze`: emotion, keyword and situation analysis only
//! - `recommend`: the full pipeline, printing a reply and the matched tracks
//! - `logs`: recent chat history, newest first
//! - `survey`: store a taste survey for a user
//! - `profile`: show the profile derived from a user's latest survey
//! - `completion`: shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! moodtune analyze "비가 와서 마음이 조금 가라앉았어."
//! moodtune recommend "시험 공부 중인데 집중이 안 돼" --user-id mina --count 15
//! moodtune survey --user-id mina --novelty 8 --year-category 2010s --genre indie --artist 검정치마
//! ```

use crate::config::CliConfig;
use crate::profile::{YearCategory, MAX_NOVELTY};
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "moodtune")]
#[command(about = "Moodtune: mood-aware music recommendations from a few lines of text")]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Endpoints, credentials and storage. Every flag can also come from the
/// environment or the config file.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct RuntimeArgs {
    /// TOML config file (defaults to <data_dir>/moodtune/config.toml if present)
    #[arg(long, global = true, env = "MOODTUNE_CONFIG", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SQLite database for chat logs and surveys
    #[arg(long, global = true, env = "MOODTUNE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, global = true, env = "OPENAI_MODEL")]
    pub openai_model: Option<String>,

    #[arg(long, global = true, env = "OPENAI_BASE_URL")]
    pub openai_base_url: Option<String>,

    /// Zero-shot classification endpoint
    #[arg(long, global = true, env = "EMOTION_ORACLE_URL")]
    pub emotion_oracle_url: Option<String>,

    #[arg(long, global = true, env = "HF_API_TOKEN", hide_env_values = true)]
    pub hf_api_token: Option<String>,

    /// Keyphrase extraction endpoint
    #[arg(long, global = true, env = "KEYWORD_ORACLE_URL")]
    pub keyword_oracle_url: Option<String>,

    #[arg(long, global = true, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[arg(long, global = true, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// Only return tracks playable in this market, e.g. KR
    #[arg(long, global = true, env = "SPOTIFY_MARKET")]
    pub spotify_market: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "MOODTUNE_TIMEOUT_SECS")]
    pub timeout: Option<u64>,
}

/// Knobs for the `recommend` command.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct TuningArgs {
    /// Number of tracks to ask the generator for
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=50))]
    pub count: Option<u16>,

    /// Stop resolving once this many tracks matched
    #[arg(long)]
    pub min_valid: Option<usize>,

    /// Minimum title similarity (0.0 - 1.0) for a catalog match
    #[arg(long)]
    pub similarity_threshold: Option<f64>,

    /// Concurrent catalog lookups
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Ignore the user's taste profile
    #[arg(long)]
    pub no_profile: bool,

    /// Do not add situation-specific content rules
    #[arg(long)]
    pub no_situation_policy: bool,
}

impl RuntimeArgs {
    /// Command-line layer of the configuration, with optional tuning flags.
    pub fn to_cli_config(&self, tuning: Option<&TuningArgs>) -> CliConfig {
        let mut config = CliConfig {
            db_path: self.db.clone(),
            openai_api_key: self.openai_api_key.clone(),
            openai_model: self.openai_model.clone(),
            openai_base_url: self.openai_base_url.clone(),
            emotion_oracle_url: self.emotion_oracle_url.clone(),
            hf_api_token: self.hf_api_token.clone(),
            keyword_oracle_url: self.keyword_oracle_url.clone(),
            spotify_client_id: self.spotify_client_id.clone(),
            spotify_client_secret: self.spotify_client_secret.clone(),
            spotify_market: self.spotify_market.clone(),
            timeout_secs: self.timeout,
            ..CliConfig::default()
        };
        if let Some(tuning) = tuning {
            config.target_count = tuning.count.map(usize::from);
            config.min_valid = tuning.min_valid;
            config.similarity_threshold = tuning.similarity_threshold;
            config.parallelism = tuning.parallelism;
            config.use_profile = tuning.no_profile.then_some(false);
            config.use_situation_policy = tuning.no_situation_policy.then_some(false);
        }
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyse the emotion, keywords and situation of a text
    Analyze {
        /// Text to analyse
        text: String,

        /// Print the analysis record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recommend tracks for a text
    ///
    /// Runs analysis, asks the generator for candidates, verifies them
    /// against the catalog and prints the reply. The turn is saved to the
    /// chat log.
    Recommend {
        /// Text describing how you feel or what is going on
        text: String,

        /// Use this user's survey profile
        #[arg(long, env = "MOODTUNE_USER")]
        user_id: Option<String>,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent chat logs, newest first
    Logs {
        #[arg(long, default_value_t = crate::chat_log::DEFAULT_RECENT_LIMIT)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },

    /// Store a taste survey
    Survey {
        #[arg(long)]
        user_id: String,

        /// Appetite for unfamiliar music, 0 (mainstream) to 10 (obscure)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=(MAX_NOVELTY as i64)))]
        novelty: u8,

        /// 1990s, 2000s, 2010s, 2020s or ALL
        #[arg(long, default_value = "ALL")]
        year_category: YearCategory,

        /// Favorite genre (repeatable)
        #[arg(long = "genre")]
        genres: Vec<String>,

        /// Favorite artist in rank order (repeatable, up to 3)
        #[arg(long = "artist")]
        artists: Vec<String>,
    },

    /// Show a user's taste profile
    Profile {
        user_id: String,
    },

    /// Generate shell completions
    ///
    /// Usage: moodtune completion bash > ~/.local/share/bash-completion/completions/moodtune
    Completion {
        shell: Shell,
    },

    /// List known user ids for completion (hidden command)
    #[command(hide = true)]
    CompleteUsers,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_recommend_tuning_flags() {
        let args = Args::try_parse_from([
            "moodtune",
            "recommend",
            "비가 와",
            "--count",
            "15",
            "--min-valid",
            "6",
            "--similarity-threshold",
            "0.7",
            "--no-profile",
        ])
        .unwrap();
        let Command::Recommend { text, tuning, .. } = args.command else {
            panic!("expected recommend");
        };
        assert_eq!(text, "비가 와");

        let config = args.runtime.to_cli_config(Some(&tuning));
        assert_eq!(config.target_count, Some(15));
        assert_eq!(config.min_valid, Some(6));
        assert_eq!(config.similarity_threshold, Some(0.7));
        assert_eq!(config.use_profile, Some(false));
        assert_eq!(config.use_situation_policy, None);
    }

    #[test]
    fn test_survey_parsing() {
        let args = Args::try_parse_from([
            "moodtune",
            "survey",
            "--user-id",
            "mina",
            "--novelty",
            "8",
            "--year-category",
            "2010s",
            "--genre",
            "indie",
            "--genre",
            "ballad",
            "--artist",
            "검정치마",
        ])
        .unwrap();
        match args.command {
            Command::Survey {
                novelty,
                year_category,
                genres,
                artists,
                ..
            } => {
                assert_eq!(novelty, 8);
                assert_eq!(year_category, YearCategory::TwentyTens);
                assert_eq!(genres, vec!["indie", "ballad"]);
                assert_eq!(artists, vec!["검정치마"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_novelty_out_of_range_rejected() {
        let result = Args::try_parse_from([
            "moodtune", "survey", "--user-id", "x", "--novelty", "11",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["moodtune", "logs", "--db", "/tmp/x.db", "--limit", "3"]).unwrap();
        assert_eq!(args.runtime.db, Some(PathBuf::from("/tmp/x.db")));
        assert!(matches!(args.command, Command::Logs { limit: 3, .. }));
    }
}
