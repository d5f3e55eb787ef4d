//! Catalog search over the Spotify Web API.
//!
//! Uses the client-credentials flow. The access token is cached until shortly
//! before it expires and dropped when the API rejects it.

use super::{check_status, http_client};
use crate::oracle::{CatalogArtist, CatalogQuery, CatalogSearch, CatalogTrack, OracleError};
use log::{debug, trace, warn};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Refresh this long before the token's stated expiry.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    external_urls: ExternalUrls,
    preview_url: Option<String>,
    id: Option<String>,
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        CatalogTrack {
            title: track.name,
            artists: track
                .artists
                .into_iter()
                .map(|a| CatalogArtist { name: a.name })
                .collect(),
            external_url: track.external_urls.spotify.unwrap_or_default(),
            preview_url: track.preview_url,
            id: track.id.filter(|id| !id.is_empty()),
            uri: track.uri,
        }
    }
}

/// Decode a `/search?type=track` body.
pub fn parse_search_response(body: &str) -> Result<Vec<CatalogTrack>, OracleError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| OracleError::InvalidResponse(e.to_string()))?;
    Ok(response
        .tracks
        .map(|page| page.items.into_iter().map(CatalogTrack::from).collect())
        .unwrap_or_default())
}

pub struct SpotifyClient {
    client: Client,
    client_id: String,
    client_secret: String,
    market: Option<String>,
    accounts_url: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: http_client(timeout)?,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            market: None,
            accounts_url: DEFAULT_ACCOUNTS_URL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: Mutex::new(None),
        })
    }

    /// Restrict results to tracks playable in `market` (ISO 3166-1 alpha-2).
    #[must_use]
    pub fn with_market(mut self, market: Option<String>) -> Self {
        self.market = market.filter(|m| !m.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_endpoints(mut self, accounts_url: &str, api_base: &str) -> Self {
        self.accounts_url = accounts_url.to_string();
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn access_token(&self) -> Result<String, OracleError> {
        let mut cached = self
            .token
            .lock()
            .map_err(|_| OracleError::Transport("token cache poisoned".into()))?;

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            return Ok(token.value.clone());
        }

        debug!("Requesting new catalog access token");
        let response = self
            .client
            .post(&self.accounts_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()?;
        let token: TokenResponse = check_status(response)?.json()?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn invalidate_token(&self) {
        if let Ok(mut cached) = self.token.lock() {
            *cached = None;
        }
    }

    fn query_params(&self, query: &CatalogQuery, limit: usize) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.to_query_string()),
            ("type", "track".to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(market) = &self.market {
            params.push(("market", market.clone()));
        }
        params
    }
}

impl CatalogSearch for SpotifyClient {
    fn search_tracks(
        &self,
        query: &CatalogQuery,
        limit: usize,
    ) -> Result<Vec<CatalogTrack>, OracleError> {
        let token = self.access_token()?;
        trace!("Catalog search: {}", query.to_query_string());

        let response = self
            .client
            .get(format!("{}/search", self.api_base))
            .bearer_auth(token)
            .query(&self.query_params(query, limit))
            .send()?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!("Catalog rejected the access token, dropping it");
            self.invalidate_token();
        }

        let body = check_status(response)?.text()?;
        parse_search_response(&body)
    }
}
