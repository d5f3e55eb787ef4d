//! SQLite persistence for chat logs and taste surveys.
//!
//! A connection is opened per operation, so [`SqliteStore`] holds only a
//! path and is freely shareable between threads.

use crate::chat_log::{ChatLog, ChatLogEntry, ChatLogStore};
use crate::profile::{ProfileStore, SurveyResponse, UserProfile, YearCategory};
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, trace};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS chat_logs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id     TEXT,
        user_text   TEXT    NOT NULL,
        reply       TEXT    NOT NULL,
        meta_json   TEXT    NOT NULL,
        created_at  TEXT    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS survey_responses (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id       TEXT    NOT NULL,
        novelty       INTEGER NOT NULL,
        year_category TEXT    NOT NULL,
        genres_json   TEXT    NOT NULL,
        artists_json  TEXT    NOT NULL,
        created_at    TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_survey_user ON survey_responses(user_id, id);
";

/// File-backed implementation of [`ChatLogStore`] and [`ProfileStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.connect()?;
        debug!("Using database at {}", store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path).with_context(|| {
            format!("Failed to open database at {}", self.path.display())
        })?;
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize database schema")?;
        Ok(conn)
    }

    /// Every user id seen in surveys or chat logs, sorted.
    pub fn list_user_ids(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM survey_responses
             UNION
             SELECT user_id FROM chat_logs WHERE user_id IS NOT NULL
             ORDER BY 1",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read user ids")?;
        Ok(ids)
    }

    /// Most recent survey of `user_id`, if any.
    pub fn latest_survey(&self, user_id: &str) -> Result<Option<SurveyResponse>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT novelty, year_category, genres_json, artists_json
                 FROM survey_responses WHERE user_id = ?1
                 ORDER BY id DESC LIMIT 1",
                [user_id],
                |row| {
                    Ok((
                        row.get::<_, u8>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("Failed to query survey for user '{user_id}'"))?;

        let Some((novelty, year, genres, artists)) = row else {
            return Ok(None);
        };

        Ok(Some(SurveyResponse {
            user_id: user_id.to_string(),
            novelty,
            year_category: year.parse::<YearCategory>()?,
            genres: serde_json::from_str(&genres).context("Corrupt genres column")?,
            favorite_artists: serde_json::from_str(&artists).context("Corrupt artists column")?,
        }))
    }
}

impl ProfileStore for SqliteStore {
    fn load_profile(&self, user_id: &str) -> Result<UserProfile> {
        Ok(self
            .latest_survey(user_id)?
            .map_or_else(|| UserProfile::empty(user_id), |survey| survey.to_profile()))
    }

    fn save_survey(&self, survey: &SurveyResponse) -> Result<()> {
        survey.validate()?;
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO survey_responses
                (user_id, novelty, year_category, genres_json, artists_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                survey.user_id.trim(),
                survey.novelty,
                survey.year_category.as_str(),
                serde_json::to_string(&survey.genres)?,
                serde_json::to_string(&survey.favorite_artists)?,
                Utc::now().to_rfc3339(),
            ],
        )
        .with_context(|| format!("Failed to store survey for user '{}'", survey.user_id))?;
        trace!("Stored survey for {}", survey.user_id);
        Ok(())
    }
}

impl ChatLogStore for SqliteStore {
    fn save(&self, entry: &ChatLogEntry) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO chat_logs (user_id, user_text, reply, meta_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.user_id,
                entry.user_text,
                entry.reply,
                entry.meta.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to insert chat log")?;
        Ok(conn.last_insert_rowid())
    }

    fn recent(&self, limit: usize) -> Result<Vec<ChatLog>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, user_text, reply, meta_json, created_at
             FROM chat_logs ORDER BY id DESC LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read chat logs")?;

        rows.into_iter()
            .map(|(id, user_id, user_text, reply, meta_json, created_at)| {
                let meta = serde_json::from_str(&meta_json)
                    .with_context(|| format!("Corrupt metadata in chat log {id}"))?;
                Ok(ChatLog {
                    id,
                    user_id,
                    user_text,
                    reply,
                    meta,
                    created_at,
                })
            })
            .collect()
    }
}
