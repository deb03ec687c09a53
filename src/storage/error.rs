use thiserror::Error;

use crate::domain::{id::TrackId, track::ValidationError};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("track {0} not found")]
    TrackNotFound(TrackId),

    #[error("track \"{title}\" by \"{artist}\" already exists")]
    DuplicateTrack { title: String, artist: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StorageError {
    /// Maps a unique constraint failure to [`StorageError::DuplicateTrack`].
    pub(crate) fn from_write(err: rusqlite::Error, title: &str, artist: &str) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::DuplicateTrack {
                    title: title.to_string(),
                    artist: artist.to_string(),
                }
            }
            other => StorageError::Database(other),
        }
    }
}
