use std::{fmt::Display, io, time::Duration};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::track::{is_http_url, non_blank};

use super::EnrichmentQuery;

/// Why a provider produced nothing.
///
/// The resolver treats all of these as "no result"; they exist so callers
/// and tests can tell a failing provider from one that simply had no match.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,

    #[error("provider responded with status {0}")]
    Http(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Best match of a single provider lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResult {
    pub cover_art_url: Option<String>,
    pub sound_clip_url: Option<String>,
    pub provider: &'static str,
    pub provider_track_id: Option<String>,
}

impl ProviderResult {
    /// Drops urls that are blank or not http(s).
    pub fn new(
        provider: &'static str,
        cover_art_url: Option<String>,
        sound_clip_url: Option<String>,
        provider_track_id: Option<impl Display>,
    ) -> Self {
        Self {
            cover_art_url: usable_url(cover_art_url),
            sound_clip_url: usable_url(sound_clip_url),
            provider,
            provider_track_id: provider_track_id.map(|id| id.to_string()),
        }
    }
}

pub(crate) fn usable_url(url: Option<String>) -> Option<String> {
    non_blank(url.as_deref()).filter(|u| is_http_url(u))
}

/// External read-only source of music metadata.
///
/// `Ok(None)` means the provider answered but had no match.
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn search(&self, query: &EnrichmentQuery) -> Result<Option<ProviderResult>, ProviderError>;
}

impl From<ureq::Error> for ProviderError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _) => ProviderError::Http(code),
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                if is_timeout_message(&message) {
                    ProviderError::Timeout
                } else {
                    ProviderError::Transport(message)
                }
            }
        }
    }
}

fn is_timeout_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("timed out") || lowered.contains("timeout")
}

fn classify_read_error(err: io::Error) -> ProviderError {
    if matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    ) || is_timeout_message(&err.to_string())
    {
        ProviderError::Timeout
    } else {
        ProviderError::Malformed(err.to_string())
    }
}

pub(crate) fn http_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .user_agent(concat!("jukebox/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// GETs `url` with the query `params` and decodes the JSON body.
///
/// `timeout` bounds the whole exchange, connect through body read.
pub(crate) fn get_json<T: DeserializeOwned>(
    agent: &ureq::Agent,
    url: &str,
    params: &[(&str, &str)],
    timeout: Duration,
) -> Result<T, ProviderError> {
    let mut request = agent
        .get(url)
        .set("Accept", "application/json")
        .timeout(timeout);
    for (key, value) in params {
        request = request.query(key, value);
    }

    let response = request.call()?;
    response.into_json::<T>().map_err(classify_read_error)
}
