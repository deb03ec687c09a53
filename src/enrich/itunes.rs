//! iTunes Search API lookup.
//!
//! No authentication, one request per lookup. Artwork comes back as a
//! 100x100 thumbnail whose size is encoded in the file name, which is
//! rewritten to request the 600x600 rendition instead.

use std::time::Duration;

use serde::Deserialize;

use super::{
    EnrichmentQuery,
    provider::{MetadataProvider, ProviderError, ProviderResult, get_json},
};

pub const PROVIDER_NAME: &str = "itunes";

const THUMBNAIL_SUFFIX: &str = "100x100bb.jpg";
const LARGE_SUFFIX: &str = "600x600bb.jpg";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    result_count: u32,
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "artworkUrl100")]
    artwork_url_100: Option<String>,
    #[serde(rename = "previewUrl")]
    preview_url: Option<String>,
    #[serde(rename = "trackId")]
    track_id: Option<u64>,
}

/// Asks for the larger artwork rendition.
///
/// Only urls following the `...100x100bb.jpg` naming are changed; anything
/// else passes through untouched.
pub fn upgrade_artwork(url: &str) -> String {
    url.replace(THUMBNAIL_SUFFIX, LARGE_SUFFIX)
}

pub struct ItunesProvider {
    agent: ureq::Agent,
    search_url: String,
    timeout: Duration,
}

impl ItunesProvider {
    pub fn new(agent: ureq::Agent, search_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            agent,
            search_url: search_url.into(),
            timeout,
        }
    }

    fn best_match(response: SearchResponse) -> Option<ProviderResult> {
        if response.result_count == 0 {
            return None;
        }
        let best = response.results.into_iter().next()?;

        Some(ProviderResult::new(
            PROVIDER_NAME,
            best.artwork_url_100.as_deref().map(upgrade_artwork),
            best.preview_url,
            best.track_id,
        ))
    }
}

impl MetadataProvider for ItunesProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn search(&self, query: &EnrichmentQuery) -> Result<Option<ProviderResult>, ProviderError> {
        let term = query.search_term();
        let response: SearchResponse = get_json(
            &self.agent,
            &self.search_url,
            &[
                ("term", term.as_str()),
                ("media", "music"),
                ("entity", "song"),
                ("limit", "1"),
            ],
            self.timeout,
        )?;

        Ok(Self::best_match(response))
    }
}
