//! Best-effort enrichment of track records with artwork and preview clips.
//!
//! [`Resolver::resolve`] looks a candidate track up with a primary provider
//! and, only when something is still missing, with a fallback provider. For
//! each field the precedence is: value already on the candidate, then the
//! primary provider, then the fallback. Provider failures never reach the
//! caller; the worst outcome is an empty [`TrackPatch`].

use std::fmt::Display;

use log::{debug, info};
use serde::Serialize;

use crate::{
    config::EnrichmentConfig,
    domain::track::{NewTrack, TrackChanges, non_blank},
};

pub mod deezer;
pub mod itunes;
pub mod provider;
#[cfg(test)]
pub(crate) mod testing;

use deezer::DeezerProvider;
use itunes::ItunesProvider;
use provider::{MetadataProvider, ProviderResult, http_agent};

/// What providers are asked about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentQuery {
    pub artist: String,
    pub title: String,
}

impl EnrichmentQuery {
    /// artist and title joined by a space, skipping blank parts
    pub fn search_term(&self) -> String {
        [self.artist.trim(), self.title.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<&NewTrack> for EnrichmentQuery {
    fn from(track: &NewTrack) -> Self {
        Self {
            artist: track.artist.clone(),
            title: track.title.clone(),
        }
    }
}

impl Display for EnrichmentQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" by \"{}\"", self.title, self.artist)
    }
}

/// Field values to merge into a track.
///
/// Absent fields are left out when serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_art_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_clip_url: Option<String>,
}

impl TrackPatch {
    fn from_candidate(candidate: &NewTrack) -> Self {
        Self {
            cover_art_url: non_blank(candidate.cover_art_url.as_deref()),
            sound_clip_url: non_blank(candidate.sound_clip_url.as_deref()),
        }
    }

    /// Fills only the fields that are still empty.
    fn fill_from(&mut self, found: ProviderResult) {
        if self.cover_art_url.is_none() {
            self.cover_art_url = found.cover_art_url;
        }
        if self.sound_clip_url.is_none() {
            self.sound_clip_url = found.sound_clip_url;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cover_art_url.is_none() && self.sound_clip_url.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.cover_art_url.is_some() && self.sound_clip_url.is_some()
    }

    pub fn merge_into(self, track: &mut NewTrack) {
        if let Some(url) = self.cover_art_url {
            track.cover_art_url = Some(url);
        }
        if let Some(url) = self.sound_clip_url {
            track.sound_clip_url = Some(url);
        }
    }

    /// Drops the fields `candidate` already had, keeping only what was looked up.
    pub fn filled_for(self, candidate: &NewTrack) -> Self {
        Self {
            cover_art_url: self.cover_art_url.filter(|_| !candidate.has_cover_art()),
            sound_clip_url: self.sound_clip_url.filter(|_| !candidate.has_sound_clip()),
        }
    }

    pub fn merge_into_changes(self, changes: &mut TrackChanges) {
        if let Some(url) = self.cover_art_url {
            changes.cover_art_url = Some(Some(url));
        }
        if let Some(url) = self.sound_clip_url {
            changes.sound_clip_url = Some(Some(url));
        }
    }
}

/// Stateless lookup chain, safe to share between request threads.
pub struct Resolver {
    primary: Box<dyn MetadataProvider>,
    fallback: Box<dyn MetadataProvider>,
}

impl Resolver {
    pub fn new(primary: Box<dyn MetadataProvider>, fallback: Box<dyn MetadataProvider>) -> Self {
        Self { primary, fallback }
    }

    /// iTunes first, Deezer as fallback, each bounded by `config.timeout_ms`
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        let agent = http_agent();
        Self::new(
            Box::new(ItunesProvider::new(
                agent.clone(),
                config.itunes_url.clone(),
                config.timeout(),
            )),
            Box::new(DeezerProvider::new(
                agent,
                config.deezer_url.clone(),
                config.timeout(),
            )),
        )
    }

    /// Returns the cover art and sound clip the candidate should end up with.
    ///
    /// A candidate that already has both gets an empty patch without any
    /// provider being asked.
    pub fn resolve(&self, candidate: &NewTrack) -> TrackPatch {
        if candidate.has_cover_art() && candidate.has_sound_clip() {
            return TrackPatch::default();
        }

        let query = EnrichmentQuery::from(candidate);
        let mut patch = TrackPatch::from_candidate(candidate);

        if let Some(found) = Self::lookup(self.primary.as_ref(), &query) {
            patch.fill_from(found);
        }
        if patch.is_complete() {
            return patch;
        }

        if let Some(found) = Self::lookup(self.fallback.as_ref(), &query) {
            patch.fill_from(found);
        }
        if patch.is_empty() {
            debug!("nothing found for {query}");
        }
        patch
    }

    fn lookup(provider: &dyn MetadataProvider, query: &EnrichmentQuery) -> Option<ProviderResult> {
        match provider.search(query) {
            Ok(Some(found)) => {
                info!(
                    "{} matched {query} (id {}): cover art {}, sound clip {}",
                    provider.name(),
                    found.provider_track_id.as_deref().unwrap_or("-"),
                    found.cover_art_url.is_some(),
                    found.sound_clip_url.is_some(),
                );
                Some(found)
            }
            Ok(None) => {
                debug!("{} has no match for {query}", provider.name());
                None
            }
            Err(e) => {
                debug!("{} lookup for {query} failed: {e}", provider.name());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        testing::{StubProvider, found},
        *,
    };
    use crate::enrich::provider::ProviderError;

    fn candidate(cover_art_url: Option<&str>, sound_clip_url: Option<&str>) -> NewTrack {
        NewTrack {
            title: "Blue".to_string(),
            artist: "Zed".to_string(),
            cover_art_url: cover_art_url.map(str::to_string),
            sound_clip_url: sound_clip_url.map(str::to_string),
        }
    }

    fn resolver(primary: &StubProvider, fallback: &StubProvider) -> Resolver {
        Resolver::new(Box::new(primary.clone()), Box::new(fallback.clone()))
    }

    #[test]
    fn test_search_term_skips_blank_parts() {
        let query = |artist: &str, title: &str| EnrichmentQuery {
            artist: artist.to_string(),
            title: title.to_string(),
        };

        assert_eq!(query("Zed", "Blue").search_term(), "Zed Blue");
        assert_eq!(query("", "Blue").search_term(), "Blue");
        assert_eq!(query("Zed", "  ").search_term(), "Zed");
    }

    #[test]
    fn test_complete_candidate_skips_providers() {
        let primary = StubProvider::answering(found("https://p1/art.jpg", "https://p1/clip.m4a"));
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback)
            .resolve(&candidate(Some("https://x/art.jpg"), Some("https://x/clip.mp3")));

        assert!(patch.is_empty());
        assert_eq!(primary.calls(), 0);
        assert_eq!(fallback.calls(), 0);
    }

    #[test]
    fn test_blank_candidate_values_count_as_missing() {
        let primary = StubProvider::answering(found("https://p1/art.jpg", "https://p1/clip.m4a"));
        let fallback = StubProvider::empty();

        let patch = resolver(&primary, &fallback).resolve(&candidate(Some("  "), Some("")));

        assert_eq!(patch.cover_art_url.as_deref(), Some("https://p1/art.jpg"));
        assert_eq!(patch.sound_clip_url.as_deref(), Some("https://p1/clip.m4a"));
        assert_eq!(primary.calls(), 1);
    }

    #[test]
    fn test_primary_fills_both_so_fallback_is_not_asked() {
        let primary = StubProvider::answering(found("https://p1/art.jpg", "https://p1/clip.m4a"));
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback).resolve(&candidate(None, None));

        assert_eq!(
            patch,
            TrackPatch {
                cover_art_url: Some("https://p1/art.jpg".to_string()),
                sound_clip_url: Some("https://p1/clip.m4a".to_string()),
            }
        );
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        assert_eq!(
            primary.queries(),
            vec![EnrichmentQuery {
                artist: "Zed".to_string(),
                title: "Blue".to_string(),
            }]
        );
    }

    #[test]
    fn test_fallback_fills_gap_without_overwriting_primary() {
        let primary = StubProvider::answering(ProviderResult::new(
            "primary",
            Some("https://p1/art.jpg".to_string()),
            None,
            None::<u64>,
        ));
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback).resolve(&candidate(None, None));

        assert_eq!(patch.cover_art_url.as_deref(), Some("https://p1/art.jpg"));
        assert_eq!(patch.sound_clip_url.as_deref(), Some("https://p2/clip.mp3"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[test]
    fn test_fallback_used_when_primary_has_nothing() {
        let primary = StubProvider::empty();
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback).resolve(&candidate(None, None));

        assert_eq!(
            patch,
            TrackPatch {
                cover_art_url: Some("https://p2/art.jpg".to_string()),
                sound_clip_url: Some("https://p2/clip.mp3".to_string()),
            }
        );
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        let primary = StubProvider::failing(ProviderError::Http(503));
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback).resolve(&candidate(None, None));

        assert_eq!(patch.sound_clip_url.as_deref(), Some("https://p2/clip.mp3"));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[test]
    fn test_both_providers_failing_gives_empty_patch() {
        let primary = StubProvider::failing(ProviderError::Timeout);
        let fallback = StubProvider::failing(ProviderError::Malformed("eof".to_string()));

        let patch = resolver(&primary, &fallback).resolve(&candidate(None, None));

        assert_eq!(patch, TrackPatch::default());
        assert_eq!(serde_json::to_string(&patch).unwrap(), "{}");
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 1);
    }

    #[test]
    fn test_candidate_value_wins_over_providers() {
        let primary = StubProvider::answering(found("https://p1/art.jpg", "https://p1/clip.m4a"));
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch = resolver(&primary, &fallback).resolve(&candidate(Some("https://x/art.jpg"), None));

        assert_eq!(patch.cover_art_url.as_deref(), Some("https://x/art.jpg"));
        assert_eq!(patch.sound_clip_url.as_deref(), Some("https://p1/clip.m4a"));
        assert_eq!(fallback.calls(), 0);
    }

    #[test]
    fn test_candidate_value_wins_when_fallback_is_asked() {
        let primary = StubProvider::empty();
        let fallback = StubProvider::answering(found("https://p2/art.jpg", "https://p2/clip.mp3"));

        let patch =
            resolver(&primary, &fallback).resolve(&candidate(None, Some("https://x/clip.mp3")));

        assert_eq!(patch.cover_art_url.as_deref(), Some("https://p2/art.jpg"));
        assert_eq!(patch.sound_clip_url.as_deref(), Some("https://x/clip.mp3"));
    }

    #[test]
    fn test_patch_serializes_camel_case_and_skips_absent() -> anyhow::Result<()> {
        let patch = TrackPatch {
            cover_art_url: Some("https://p1/art.jpg".to_string()),
            sound_clip_url: None,
        };

        assert_eq!(
            serde_json::to_value(&patch)?,
            serde_json::json!({"coverArtUrl": "https://p1/art.jpg"})
        );
        Ok(())
    }

    #[test]
    fn test_filled_for_drops_supplied_fields() {
        let candidate = candidate(Some("https://x/art.jpg"), None);
        let patch = TrackPatch {
            cover_art_url: Some("https://x/art.jpg".to_string()),
            sound_clip_url: Some("https://p1/clip.m4a".to_string()),
        };

        assert_eq!(
            patch.filled_for(&candidate),
            TrackPatch {
                cover_art_url: None,
                sound_clip_url: Some("https://p1/clip.m4a".to_string()),
            }
        );
    }

    #[test]
    fn test_merge_into_changes_sets_only_present_fields() {
        let mut changes = TrackChanges {
            title: Some("Green".to_string()),
            ..Default::default()
        };

        TrackPatch {
            cover_art_url: None,
            sound_clip_url: Some("https://p1/clip.m4a".to_string()),
        }
        .merge_into_changes(&mut changes);

        assert_eq!(changes.title.as_deref(), Some("Green"));
        assert_eq!(changes.cover_art_url, None);
        assert_eq!(
            changes.sound_clip_url,
            Some(Some("https://p1/clip.m4a".to_string()))
        );
    }
}
