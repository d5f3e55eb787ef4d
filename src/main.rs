//! # Moodtune
//!
//! Reads a few lines of text, works out the mood behind them and recommends
//! tracks that exist in the Spotify catalog.
//!
//! ## Usage
//!
//! ```bash
//! export OPENAI_API_KEY=... SPOTIFY_CLIENT_ID=... SPOTIFY_CLIENT_SECRET=...
//! export KEYWORD_ORACLE_URL=http://localhost:8001/keywords
//!
//! moodtune analyze "비가 와서 마음이 조금 가라앉았어."
//! moodtune recommend "퇴근길인데 너무 지쳤어" --user-id mina
//! moodtune logs --limit 5
//! ```
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=moodtune=debug`.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use moodtune::analysis::{AnalysisRecord, Analyzer};
use moodtune::chat_log::{ChatLog, ChatLogStore};
use moodtune::cli::{self, Command, RuntimeArgs, TuningArgs};
use moodtune::clients::{KeyphraseClient, OpenAiClient, SpotifyClient, ZeroShotClient};
use moodtune::completion;
use moodtune::config::{self, AppConfig, FileConfig};
use moodtune::db::SqliteStore;
use moodtune::pipeline::{RecommendationOutcome, Recommender};
use moodtune::profile::{ProfileStore, SurveyResponse};
use moodtune::resolver::CatalogResolver;
use moodtune::synthesizer::Synthesizer;
use std::path::PathBuf;
use std::sync::Arc;

fn load_file_config(runtime: &RuntimeArgs) -> Result<Option<FileConfig>> {
    config::discover_file_config(runtime.config.as_deref())
}

/// Resolve settings for commands that call external services. Missing
/// credentials stop the process here.
fn app_config(runtime: &RuntimeArgs, tuning: Option<&TuningArgs>) -> Result<AppConfig> {
    let file = load_file_config(runtime)?;
    let config = AppConfig::resolve(&runtime.to_cli_config(tuning), file)?;
    debug!("Resolved configuration, database at {}", config.db_path.display());
    Ok(config)
}

fn db_path(runtime: &RuntimeArgs) -> Result<PathBuf> {
    let file = load_file_config(runtime)?;
    config::resolve_db_path(&runtime.to_cli_config(None), file.as_ref())
}

fn open_store(runtime: &RuntimeArgs) -> Result<SqliteStore> {
    SqliteStore::open(db_path(runtime)?)
}

fn build_analyzer(config: &AppConfig) -> Result<Analyzer> {
    let emotion = ZeroShotClient::new(
        &config.emotion_oracle_url,
        config.hf_api_token.clone(),
        config.timeout,
    )?;
    let keywords = KeyphraseClient::new(&config.keyword_oracle_url, config.timeout)?;
    Ok(Analyzer::new(Arc::new(emotion), Arc::new(keywords)))
}

fn build_recommender(config: &AppConfig, store: Arc<SqliteStore>) -> Result<Recommender> {
    let generator = OpenAiClient::new(
        &config.openai_base_url,
        &config.openai_model,
        &config.openai_api_key,
        config.timeout,
    )?;
    let catalog = SpotifyClient::new(
        &config.spotify_client_id,
        &config.spotify_client_secret,
        config.timeout,
    )?
    .with_market(config.spotify_market.clone());

    Ok(Recommender::new(
        build_analyzer(config)?,
        Synthesizer::new(Arc::new(generator), config.synthesis.clone()),
        CatalogResolver::new(Arc::new(catalog), config.resolver.clone()),
    )
    .with_profiles(store.clone())
    .with_chat_log(store)
    .with_min_valid(config.min_valid))
}

fn print_analysis(record: &AnalysisRecord) {
    if record.is_unknown() {
        println!("Nothing to analyse: the text is empty.");
        return;
    }
    println!("Mood:      {} ({:.2})", record.top1_label, record.top1_score);
    if let Some(label) = &record.top2_label {
        println!("Secondary: {label} ({:.2})", record.top2_score);
    }
    let weights: Vec<String> = record
        .weights
        .iter()
        .map(|(label, weight)| format!("{label}={weight:.2}"))
        .collect();
    println!("Weights:   {}", weights.join(", "));
    println!("Situation: {}", record.situation);
    println!("Keywords:  {}", record.keywords_csv());
}

fn print_outcome(outcome: &RecommendationOutcome) {
    println!("{}", outcome.reply);
    if outcome.tracks.is_empty() {
        return;
    }
    println!();
    for (i, track) in outcome.tracks.iter().enumerate() {
        println!("{:>2}. {} - {}", i + 1, track.canonical_title, track.canonical_artist);
        if !track.embed_url.is_empty() {
            println!("    {}", track.embed_url);
        }
    }
}

fn print_logs(logs: &[ChatLog]) {
    if logs.is_empty() {
        println!("No chat logs yet.");
        return;
    }
    for log in logs {
        let user = log.user_id.as_deref().unwrap_or("anonymous");
        println!("#{} [{}] {user}: {}", log.id, log.created_at, log.user_text);
        for line in log.reply.lines() {
            println!("    {line}");
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let runtime = &args.runtime;

    match args.command {
        Command::Analyze { text, json } => {
            let config = app_config(runtime, None)?;
            let record = build_analyzer(&config)?.analyze(&text)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_analysis(&record);
            }
        }
        Command::Recommend {
            text,
            user_id,
            tuning,
            json,
        } => {
            let config = app_config(runtime, Some(&tuning))?;
            let store = Arc::new(SqliteStore::open(&config.db_path)?);
            let recommender = build_recommender(&config, store)?;

            info!("Recommending for {} character(s)", text.chars().count());
            let outcome = recommender.recommend(&text, user_id.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Command::Logs { limit, json } => {
            let logs = open_store(runtime)?.recent(limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                print_logs(&logs);
            }
        }
        Command::Survey {
            user_id,
            novelty,
            year_category,
            genres,
            artists,
        } => {
            let survey = SurveyResponse {
                user_id,
                novelty,
                year_category,
                genres,
                favorite_artists: artists,
            };
            open_store(runtime)?
                .save_survey(&survey)
                .context("Survey was not saved")?;
            println!("Saved survey for {}", survey.user_id);
        }
        Command::Profile { user_id } => {
            let profile = open_store(runtime)?.load_profile(&user_id)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd)?;
        }
        Command::CompleteUsers => {
            // Completion scripts call this; never fail loudly.
            if let Ok(path) = db_path(runtime) {
                completion::print_user_completions(&path)?;
            }
        }
    }

    Ok(())
}
