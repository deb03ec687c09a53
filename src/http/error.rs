use rouille::Response;
use serde::{Deserialize, Serialize};

use crate::{domain::track::ValidationError, storage::error::StorageError};

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::TrackNotFound(_) => ApiError::NotFound("Track not found".into()),

            StorageError::DuplicateTrack { .. } => ApiError::Conflict(err.to_string()),

            StorageError::Validation(e) => ApiError::from(e),

            StorageError::Database(_) | StorageError::Internal(_) => {
                log::error!("{err}");
                ApiError::Internal("Internal Server Error".into())
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl ApiError {
    pub fn invalid_track_id() -> Self {
        ApiError::BadRequest("Invalid track id".into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotFound(_) => 404,
            ApiError::BadRequest(_) => 400,
            ApiError::Conflict(_) => 409,
            ApiError::Internal(_) => 500,
        }
    }

    pub fn into_response(self) -> Response {
        let status = self.status_code();
        let error = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg,
        };

        Response::json(&ErrorBody { error }).with_status_code(status)
    }
}
