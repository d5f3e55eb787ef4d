//! Mood-aware music recommendations from a few lines of text.
//!
//! A submitted text flows through these stages:
//!
//! 1. [`analysis`] scores it against seven emotion labels, extracts key
//!    phrases and tags a [`situation`], producing an [`analysis::AnalysisRecord`]
//! 2. [`synthesizer`] asks a generative oracle for candidate tracks, using the
//!    prompts built in [`prompt`] and an optional [`profile::UserProfile`]
//! 3. [`resolver`] verifies candidates against the live catalog and keeps the
//!    first few that really exist
//! 4. [`pipeline`] turns the result into a reply and writes a [`chat_log`] entry
//!
//! ### Supporting Modules
//!
//! - [`oracle`] - traits for every external service the core calls
//! - [`clients`] - HTTP implementations of those traits
//! - [`algorithm`] - weight rounding and title similarity
//! - [`db`] - SQLite storage for chat logs and surveys
//! - [`config`] - data directory and layered configuration
//! - [`cli`] / [`completion`] - command-line surface
//! - [`error`] - the error taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use moodtune::analysis::Analyzer;
//! use moodtune::clients::{KeyphraseClient, OpenAiClient, SpotifyClient, ZeroShotClient};
//! use moodtune::pipeline::Recommender;
//! use moodtune::resolver::{CatalogResolver, ResolverConfig};
//! use moodtune::synthesizer::{SynthesisConfig, Synthesizer};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_secs(20);
//! let analyzer = Analyzer::new(
//!     Arc::new(ZeroShotClient::new(moodtune::clients::inference::DEFAULT_EMOTION_ORACLE_URL, None, timeout)?),
//!     Arc::new(KeyphraseClient::new("http://localhost:8001/keywords", timeout)?),
//! );
//! let synthesizer = Synthesizer::new(
//!     Arc::new(OpenAiClient::new("https://api.openai.com/v1", "gpt-4o-mini", "sk-...", timeout)?),
//!     SynthesisConfig::for_target_count(10),
//! );
//! let resolver = CatalogResolver::new(
//!     Arc::new(SpotifyClient::new("client-id", "client-secret", timeout)?),
//!     ResolverConfig::default(),
//! );
//!
//! let recommender = Recommender::new(analyzer, synthesizer, resolver);
//! let outcome = recommender.recommend("비가 와서 마음이 조금 가라앉았어.", None)?;
//! println!("{}", outcome.reply);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library stages return [`error::RecommendError`]. Per-candidate and
//! per-call failures are absorbed and shrink the result; only configuration
//! errors are fatal. Storage and configuration helpers return
//! `anyhow::Result` with context.

pub mod algorithm;
pub mod analysis;
pub mod chat_log;
pub mod cli;
pub mod clients;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod oracle;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod resolver;
pub mod situation;
pub mod synthesizer;
