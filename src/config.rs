//! # Configuration
//!
//! Settings come from three layers, highest precedence first:
//!
//! 1. command-line flags and their environment variables (`OPENAI_API_KEY`, ...)
//! 2. an optional TOML file, `--config <FILE>` or `<data_dir>/moodtune/config.toml`
//! 3. built-in defaults
//!
//! The database lives in the platform data directory:
//! - Linux: `~/.local/share/moodtune/moodtune.db`
//! - macOS: `~/Library/Application Support/moodtune/moodtune.db`
//! - Windows: `%APPDATA%\moodtune\moodtune.db`
//!
//! Credentials are checked once, when [`AppConfig::resolve`] runs, so a
//! misconfigured process fails before it handles any text.

use crate::clients::inference::DEFAULT_EMOTION_ORACLE_URL;
use crate::clients::openai::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::error::RecommendError;
use crate::resolver::{ResolverConfig, DEFAULT_MIN_VALID, DEFAULT_SIMILARITY_THRESHOLD, MAX_MIN_VALID};
use crate::synthesizer::{SynthesisConfig, DEFAULT_TARGET_COUNT};
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "moodtune";
pub const DB_FILE: &str = "moodtune.db";
pub const CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Returns the platform data directory for moodtune, creating it if needed.
///
/// # Errors
///
/// Fails when the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        )
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create moodtune data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;

    Ok(app_dir)
}

/// Returns the default database path.
///
/// ```no_run
/// let db_path = moodtune::config::get_db_path()?;
/// println!("Database location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

/// Settings read from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub db_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub emotion_oracle_url: Option<String>,
    pub hf_api_token: Option<String>,
    pub keyword_oracle_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_market: Option<String>,
    pub timeout_secs: Option<u64>,
    pub target_count: Option<usize>,
    pub use_profile: Option<bool>,
    pub use_situation_policy: Option<bool>,
    pub min_valid: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub parallelism: Option<usize>,
}

/// Settings supplied on the command line or through the environment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub openai_base_url: Option<String>,
    pub emotion_oracle_url: Option<String>,
    pub hf_api_token: Option<String>,
    pub keyword_oracle_url: Option<String>,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_market: Option<String>,
    pub timeout_secs: Option<u64>,
    pub target_count: Option<usize>,
    /// `Some(false)` when profile blending was switched off.
    pub use_profile: Option<bool>,
    pub use_situation_policy: Option<bool>,
    pub min_valid: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub parallelism: Option<usize>,
}

/// Parse a TOML config file.
pub fn load_file_config(path: &Path) -> Result<FileConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Load the explicit config file, or the default one if it exists.
///
/// An explicitly named file must exist; the default location is optional.
pub fn discover_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }
    let default = get_data_dir()?.join(CONFIG_FILE);
    if default.is_file() {
        debug!("Loading config from {}", default.display());
        load_file_config(&default).map(Some)
    } else {
        Ok(None)
    }
}

/// Database path for storage-only commands.
pub fn resolve_db_path(cli: &CliConfig, file: Option<&FileConfig>) -> Result<PathBuf> {
    match cli
        .db_path
        .clone()
        .or_else(|| file.and_then(|f| f.db_path.clone()))
    {
        Some(path) => Ok(path),
        None => get_db_path(),
    }
}

/// Fully resolved settings for request-serving commands.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub emotion_oracle_url: String,
    pub hf_api_token: Option<String>,
    pub keyword_oracle_url: String,
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_market: Option<String>,
    pub timeout: Duration,
    pub synthesis: SynthesisConfig,
    pub resolver: ResolverConfig,
    pub min_valid: usize,
}

/// First non-blank value of the two layers.
fn pick<T: Clone>(cli: &Option<T>, file: Option<&T>) -> Option<T> {
    cli.clone().or_else(|| file.cloned())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Merge CLI/env values over the file, apply defaults and validate.
    ///
    /// # Errors
    ///
    /// [`RecommendError::Configuration`] naming every missing credential, or
    /// the first tunable that is out of range.
    pub fn resolve(cli: &CliConfig, file: Option<FileConfig>) -> Result<Self, RecommendError> {
        let file = file.unwrap_or_default();
        let string = |c: &Option<String>, f: &Option<String>| non_blank(pick(c, f.as_ref()));

        let required = [
            ("OPENAI_API_KEY", string(&cli.openai_api_key, &file.openai_api_key)),
            ("SPOTIFY_CLIENT_ID", string(&cli.spotify_client_id, &file.spotify_client_id)),
            (
                "SPOTIFY_CLIENT_SECRET",
                string(&cli.spotify_client_secret, &file.spotify_client_secret),
            ),
            ("KEYWORD_ORACLE_URL", string(&cli.keyword_oracle_url, &file.keyword_oracle_url)),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(RecommendError::Configuration(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        }
        let [openai_api_key, spotify_client_id, spotify_client_secret, keyword_oracle_url] =
            required.map(|(_, value)| value.unwrap_or_default());

        let target_count = pick(&cli.target_count, file.target_count.as_ref()).unwrap_or(DEFAULT_TARGET_COUNT);
        if target_count == 0 {
            return Err(RecommendError::Configuration("target count must be at least 1".into()));
        }
        let similarity_threshold = pick(&cli.similarity_threshold, file.similarity_threshold.as_ref())
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(RecommendError::Configuration(format!(
                "similarity threshold must be within [0, 1], got {similarity_threshold}"
            )));
        }
        let parallelism = pick(&cli.parallelism, file.parallelism.as_ref()).unwrap_or(1);
        if parallelism == 0 {
            return Err(RecommendError::Configuration("parallelism must be at least 1".into()));
        }
        let min_valid = pick(&cli.min_valid, file.min_valid.as_ref()).unwrap_or(DEFAULT_MIN_VALID);
        if !(1..=MAX_MIN_VALID).contains(&min_valid) {
            return Err(RecommendError::Configuration(format!(
                "min valid must be within [1, {MAX_MIN_VALID}], got {min_valid}"
            )));
        }
        let timeout_secs = pick(&cli.timeout_secs, file.timeout_secs.as_ref()).unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(RecommendError::Configuration("timeout must be at least 1 second".into()));
        }

        let db_path = match pick(&cli.db_path, file.db_path.as_ref()) {
            Some(path) => path,
            None => get_db_path().map_err(|e| RecommendError::Configuration(format!("{e:#}")))?,
        };

        let mut synthesis = SynthesisConfig::for_target_count(target_count);
        synthesis.use_profile = pick(&cli.use_profile, file.use_profile.as_ref()).unwrap_or(true);
        synthesis.use_situation_policy =
            pick(&cli.use_situation_policy, file.use_situation_policy.as_ref()).unwrap_or(true);

        Ok(Self {
            db_path,
            openai_api_key,
            openai_model: string(&cli.openai_model, &file.openai_model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_base_url: string(&cli.openai_base_url, &file.openai_base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            emotion_oracle_url: string(&cli.emotion_oracle_url, &file.emotion_oracle_url)
                .unwrap_or_else(|| DEFAULT_EMOTION_ORACLE_URL.to_string()),
            hf_api_token: string(&cli.hf_api_token, &file.hf_api_token),
            keyword_oracle_url,
            spotify_client_id,
            spotify_client_secret,
            spotify_market: string(&cli.spotify_market, &file.spotify_market),
            timeout: Duration::from_secs(timeout_secs),
            synthesis,
            resolver: ResolverConfig {
                similarity_threshold,
                parallelism,
                ..ResolverConfig::default()
            },
            min_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn credentials() -> CliConfig {
        CliConfig {
            db_path: Some(PathBuf::from("/tmp/moodtune-test.db")),
            openai_api_key: Some("sk-cli".into()),
            spotify_client_id: Some("cid".into()),
            spotify_client_secret: Some("secret".into()),
            keyword_oracle_url: Some("http://localhost:8001/keywords".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_db_path_structure() {
        let path = get_db_path().expect("Should get valid path");
        assert_eq!(path.file_name().unwrap(), DB_FILE);
        assert_eq!(path.parent().unwrap().file_name().unwrap(), APP_DIR);
        assert!(path.parent().unwrap().is_dir());
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::resolve(&credentials(), None).unwrap();
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.synthesis.target_count, 10);
        assert!(config.synthesis.use_profile);
        assert_eq!(config.min_valid, 4);
        assert_eq!(config.resolver.similarity_threshold, 0.8);
        assert_eq!(config.resolver.parallelism, 1);
        assert_eq!(config.spotify_market, None);
    }

    #[test]
    fn test_missing_credentials_are_all_reported() {
        let cli = CliConfig {
            openai_api_key: Some("  ".into()),
            ..Default::default()
        };
        let err = AppConfig::resolve(&cli, None).unwrap_err();
        assert!(err.is_fatal());
        let message = err.to_string();
        for name in ["OPENAI_API_KEY", "SPOTIFY_CLIENT_ID", "SPOTIFY_CLIENT_SECRET", "KEYWORD_ORACLE_URL"] {
            assert!(message.contains(name), "{message} should mention {name}");
        }
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            openai_api_key: Some("sk-file".into()),
            openai_model: Some("gpt-4o".into()),
            min_valid: Some(6),
            similarity_threshold: Some(0.7),
            use_profile: Some(false),
            ..Default::default()
        };
        let cli = CliConfig {
            min_valid: Some(3),
            ..credentials()
        };
        let config = AppConfig::resolve(&cli, Some(file)).unwrap();
        assert_eq!(config.openai_api_key, "sk-cli");
        assert_eq!(config.openai_model, "gpt-4o");
        assert_eq!(config.min_valid, 3);
        assert_eq!(config.resolver.similarity_threshold, 0.7);
        assert!(!config.synthesis.use_profile);
    }

    #[test]
    fn test_out_of_range_tunables() {
        for cli in [
            CliConfig { similarity_threshold: Some(1.5), ..credentials() },
            CliConfig { parallelism: Some(0), ..credentials() },
            CliConfig { target_count: Some(0), ..credentials() },
            CliConfig { timeout_secs: Some(0), ..credentials() },
            CliConfig { min_valid: Some(0), ..credentials() },
            CliConfig { min_valid: Some(usize::MAX), ..credentials() },
        ] {
            assert!(matches!(
                AppConfig::resolve(&cli, None),
                Err(RecommendError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_min_valid_from_file_is_checked() {
        let file = FileConfig {
            min_valid: Some(10_000_000),
            ..Default::default()
        };
        let err = AppConfig::resolve(&credentials(), Some(file)).unwrap_err();
        assert!(err.to_string().contains("min valid"));

        let file = FileConfig {
            min_valid: Some(MAX_MIN_VALID),
            ..Default::default()
        };
        let config = AppConfig::resolve(&credentials(), Some(file)).unwrap();
        assert_eq!(config.min_valid, MAX_MIN_VALID);
    }

    #[test]
    fn test_load_file_config() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "openai_model = \"gpt-4o\"\nspotify_market = \"KR\"\ntarget_count = 20\nparallelism = 4"
        )
        .unwrap();
        let config = load_file_config(file.path()).unwrap();
        assert_eq!(config.openai_model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.target_count, Some(20));

        let resolved = AppConfig::resolve(&credentials(), Some(config)).unwrap();
        assert_eq!(resolved.spotify_market.as_deref(), Some("KR"));
        assert_eq!(resolved.synthesis.max_favorite_artist_tracks, 12);
        assert_eq!(resolved.resolver.parallelism, 4);
    }

    #[test]
    fn test_unknown_file_keys_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not_a_key = 1").unwrap();
        assert!(load_file_config(file.path()).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        assert!(discover_file_config(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn test_resolve_db_path_prefers_cli() {
        let cli = CliConfig {
            db_path: Some(PathBuf::from("/a.db")),
            ..Default::default()
        };
        let file = FileConfig {
            db_path: Some(PathBuf::from("/b.db")),
            ..Default::default()
        };
        assert_eq!(resolve_db_path(&cli, Some(&file)).unwrap(), PathBuf::from("/a.db"));
        assert_eq!(
            resolve_db_path(&CliConfig::default(), Some(&file)).unwrap(),
            PathBuf::from("/b.db")
        );
    }
}
