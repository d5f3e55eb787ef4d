//! HTTP adapters implementing the oracle traits.
//!
//! All clients are blocking, carry a per-request timeout and are safe to share
//! across threads.

pub mod inference;
pub mod openai;
pub mod spotify;

use crate::oracle::OracleError;
use reqwest::blocking::{Client, Response};
use std::time::Duration;

pub use inference::{KeyphraseClient, ZeroShotClient};
pub use openai::OpenAiClient;
pub use spotify::SpotifyClient;

/// Longest error body kept in [`OracleError::Api`] messages.
const MAX_ERROR_BODY: usize = 500;

/// Build a blocking client with the given timeout.
pub fn http_client(timeout: Duration) -> Result<Client, OracleError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("moodtune/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(OracleError::from)
}

/// Pass successful responses through, turn everything else into an API error.
pub(crate) fn check_status(response: Response) -> Result<Response, OracleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(OracleError::Api {
        status: status.as_u16(),
        message: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}
