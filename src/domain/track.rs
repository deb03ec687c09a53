use chrono::{DateTime, Utc};
use thiserror::Error;

use super::id::TrackId;

/// Represent a stored music track
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub cover_art_url: Option<String>,
    pub sound_clip_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a track before it gets an id and timestamps.
///
/// This is also the shape enrichment works on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTrack {
    pub title: String,
    pub artist: String,
    pub cover_art_url: Option<String>,
    pub sound_clip_url: Option<String>,
}

/// Partial update of a track.
///
/// `None` leaves a field untouched. For the optional urls,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackChanges {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub cover_art_url: Option<Option<String>>,
    pub sound_clip_url: Option<Option<String>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title and artist are required")]
    MissingTitleOrArtist,

    #[error("{field} must be a valid http(s) URL")]
    InvalidUrl { field: &'static str },
}

pub const COVER_ART_URL: &str = "coverArtUrl";
pub const SOUND_CLIP_URL: &str = "soundClipUrl";

/// `true` when `value` starts with `http://` or `https://`, ignoring case
pub fn is_http_url(value: &str) -> bool {
    let lower = value.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// trims the value and turns blank strings into `None`
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate_url(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    match non_blank(value.as_deref()) {
        Some(url) if !is_http_url(&url) => Err(ValidationError::InvalidUrl { field }),
        other => Ok(other),
    }
}

impl NewTrack {
    /// Trims every field and checks the invariants a stored track must hold.
    pub fn validated(self) -> Result<NewTrack, ValidationError> {
        let title =
            non_blank(Some(self.title.as_str())).ok_or(ValidationError::MissingTitleOrArtist)?;
        let artist =
            non_blank(Some(self.artist.as_str())).ok_or(ValidationError::MissingTitleOrArtist)?;

        Ok(NewTrack {
            title,
            artist,
            cover_art_url: validate_url(COVER_ART_URL, self.cover_art_url)?,
            sound_clip_url: validate_url(SOUND_CLIP_URL, self.sound_clip_url)?,
        })
    }

    pub fn has_cover_art(&self) -> bool {
        non_blank(self.cover_art_url.as_deref()).is_some()
    }

    pub fn has_sound_clip(&self) -> bool {
        non_blank(self.sound_clip_url.as_deref()).is_some()
    }
}

impl Track {
    pub fn to_new_track(&self) -> NewTrack {
        NewTrack {
            title: self.title.clone(),
            artist: self.artist.clone(),
            cover_art_url: self.cover_art_url.clone(),
            sound_clip_url: self.sound_clip_url.clone(),
        }
    }
}

impl TrackChanges {
    /// Fields of `track` as they would look after these changes.
    ///
    /// The result is not validated.
    pub fn apply_to(&self, track: &Track) -> NewTrack {
        let mut draft = track.to_new_track();
        if let Some(title) = &self.title {
            draft.title = title.clone();
        }
        if let Some(artist) = &self.artist {
            draft.artist = artist.clone();
        }
        if let Some(url) = &self.cover_art_url {
            draft.cover_art_url = url.clone();
        }
        if let Some(url) = &self.sound_clip_url {
            draft.sound_clip_url = url.clone();
        }
        draft
    }
}
