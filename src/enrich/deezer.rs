//! Deezer search lookup, used to fill what iTunes left empty.

use std::time::Duration;

use serde::Deserialize;

use super::{
    EnrichmentQuery,
    provider::{MetadataProvider, ProviderError, ProviderResult, get_json, usable_url},
};

pub const PROVIDER_NAME: &str = "deezer";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    // error payloads come back with 200 and no `data`
    #[serde(default)]
    data: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<u64>,
    preview: Option<String>,
    album: Option<Album>,
}

#[derive(Debug, Deserialize)]
struct Album {
    cover_big: Option<String>,
    cover_medium: Option<String>,
}

/// Structured `artist:"..." track:"..."` query.
///
/// Double quotes inside the values would end the quoted filter early,
/// so they are dropped.
pub fn structured_query(query: &EnrichmentQuery) -> String {
    let quoted = |value: &str| value.trim().replace('"', "");
    format!(
        "artist:\"{}\" track:\"{}\"",
        quoted(&query.artist),
        quoted(&query.title)
    )
}

pub struct DeezerProvider {
    agent: ureq::Agent,
    search_url: String,
    timeout: Duration,
}

impl DeezerProvider {
    pub fn new(agent: ureq::Agent, search_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent,
            search_url: search_url.into(),
            timeout,
        }
    }

    fn best_match(response: SearchResponse) -> Option<ProviderResult> {
        let best = response.data.into_iter().next()?;
        let cover_art_url = best
            .album
            .and_then(|album| usable_url(album.cover_big).or(usable_url(album.cover_medium)));

        Some(ProviderResult::new(
            PROVIDER_NAME,
            cover_art_url,
            best.preview,
            best.id,
        ))
    }
}

impl MetadataProvider for DeezerProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn search(&self, query: &EnrichmentQuery) -> Result<Option<ProviderResult>, ProviderError> {
        let q = structured_query(query);
        let response: SearchResponse =
            get_json(&self.agent, &self.search_url, &[("q", q.as_str())], self.timeout)?;

        Ok(Self::best_match(response))
    }
}
