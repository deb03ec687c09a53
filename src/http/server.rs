use anyhow::anyhow;
use chrono::SecondsFormat;
use log::info;
use rouille::{Request, Response};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    config::HttpConfig,
    domain::{
        id::TrackId,
        track::{NewTrack, Track, TrackChanges},
    },
    enrich::Resolver,
    http::error::ApiError,
    storage::{error::StorageError, operations::Storage},
};

const SERVICE_NAME: &str = "Jukebox API";
const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

pub struct HttpServer {
    storage: Arc<Mutex<Storage>>,
    /// `None` when enrichment is switched off
    resolver: Option<Resolver>,
    pub config: HttpConfig,
}

impl HttpServer {
    pub fn new(storage: Storage, resolver: Option<Resolver>, config: HttpConfig) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            resolver,
            config,
        }
    }

    pub fn run(self) {
        let addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        rouille::start_server(addr, move |request| self.handle_request(request));
    }

    fn handle_request(&self, request: &Request) -> Response {
        Self::log_request(request);

        let response = if request.method() == "OPTIONS" {
            Self::preflight(request)
        } else {
            let result = rouille::router!(request,
                (GET) (/) => {
                    Ok(Response::json(&HealthResponse { message: SERVICE_NAME.into() }))
                },

                (POST) (/tracks) => {
                    self.create_track(request)
                },
                (GET) (/tracks) => {
                    self.list_tracks()
                },
                (GET) (/tracks/{id: String}) => {
                    self.show_track(&id)
                },
                (PUT) (/tracks/{id: String}) => {
                    self.update_track(&id, request)
                },
                (DELETE) (/tracks/{id: String}) => {
                    self.delete_track(&id)
                },
                (POST) (/tracks/{id: String}) => {
                    self.handle_method_override(&id, request)
                },
                _ => Err(ApiError::NotFound("Not Found".into()))
            );

            result.unwrap_or_else(ApiError::into_response)
        };

        let response = response.with_additional_header("Access-Control-Allow-Origin", "*");
        info!("Response: {} {}", request.method(), response.status_code);
        response
    }

    fn log_request(request: &Request) {
        info!("{} {}", request.method(), request.raw_url());
    }

    fn preflight(request: &Request) -> Response {
        let allowed_headers = request
            .header("Access-Control-Request-Headers")
            .unwrap_or("Content-Type")
            .to_string();

        Response::text("")
            .with_status_code(204)
            .with_additional_header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .with_additional_header("Access-Control-Allow-Headers", allowed_headers)
    }

    /// HTML forms can only POST, so `?_method=PUT|DELETE` picks the real verb
    fn handle_method_override(&self, id: &str, request: &Request) -> Result<Response, ApiError> {
        let method = request.get_param("_method").map(|m| m.to_ascii_uppercase());
        match method.as_deref() {
            Some("PUT") => self.update_track(id, request),
            Some("DELETE") => self.delete_track(id),
            _ => Err(ApiError::NotFound("Not Found".into())),
        }
    }

    fn lock_storage(&self) -> Result<MutexGuard<'_, Storage>, ApiError> {
        self.storage.lock().map_err(|e| {
            ApiError::from(StorageError::Internal(anyhow!(
                "Could not access jukebox storage under lock: {e}"
            )))
        })
    }

    fn create_track(&self, request: &Request) -> Result<Response, ApiError> {
        let body: CreateTrackRequest = read_json(request)?;
        let mut new = body.into_new_track().validated()?;

        // storage stays unlocked while providers are queried
        if let Some(resolver) = &self.resolver {
            resolver.resolve(&new).merge_into(&mut new);
        }

        let track = self.lock_storage()?.create_track(new)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)).with_status_code(201))
    }

    fn list_tracks(&self) -> Result<Response, ApiError> {
        let tracks = self.lock_storage()?.list_tracks()?;
        let body = tracks
            .iter()
            .map(TrackResponse::from_domain)
            .collect::<Vec<_>>();
        Ok(Response::json(&body))
    }

    fn show_track(&self, id: &str) -> Result<Response, ApiError> {
        let track_id = parse_track_id(id)?;
        let track = self.lock_storage()?.get_track(track_id)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }

    fn update_track(&self, id: &str, request: &Request) -> Result<Response, ApiError> {
        let track_id = parse_track_id(id)?;
        let body: UpdateTrackRequest = read_json(request)?;
        let mut changes = body.into_changes();

        if let Some(resolver) = &self.resolver {
            let existing = self.lock_storage()?.get_track(track_id)?;
            let candidate = changes.apply_to(&existing).validated()?;
            // fields the record already had are not written back, the lock
            // was released and they may have changed since
            resolver
                .resolve(&candidate)
                .filled_for(&candidate)
                .merge_into_changes(&mut changes);
        }

        let track = self.lock_storage()?.update_track(track_id, &changes)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }

    fn delete_track(&self, id: &str) -> Result<Response, ApiError> {
        let track_id = parse_track_id(id)?;
        let track = self.lock_storage()?.delete_track(track_id)?;
        Ok(Response::json(&TrackResponse::from_domain(&track)))
    }
}

fn parse_track_id(id: &str) -> Result<TrackId, ApiError> {
    TrackId::parse(id).map_err(|_| ApiError::invalid_track_id())
}

fn read_json<T: serde::de::DeserializeOwned>(request: &Request) -> Result<T, ApiError> {
    rouille::input::json_input(request)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Distinguishes a key sent as `null` from a missing key
fn present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTrackRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    cover_art_url: Option<String>,
    #[serde(default)]
    sound_clip_url: Option<String>,
}

impl CreateTrackRequest {
    fn into_new_track(self) -> NewTrack {
        NewTrack {
            title: self.title.unwrap_or_default(),
            artist: self.artist.unwrap_or_default(),
            cover_art_url: self.cover_art_url,
            sound_clip_url: self.sound_clip_url,
        }
    }
}

/// Only these four keys are read; anything else in the body is ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTrackRequest {
    #[serde(default, deserialize_with = "present")]
    title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    artist: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    cover_art_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    sound_clip_url: Option<Option<String>>,
}

impl UpdateTrackRequest {
    fn into_changes(self) -> TrackChanges {
        TrackChanges {
            // a null title or artist fails validation as blank
            title: self.title.map(Option::unwrap_or_default),
            artist: self.artist.map(Option::unwrap_or_default),
            cover_art_url: self.cover_art_url,
            sound_clip_url: self.sound_clip_url,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackResponse {
    id: String,
    title: String,
    artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cover_art_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sound_clip_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TrackResponse {
    fn from_domain(track: &Track) -> Self {
        Self {
            id: track.id.to_hex(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            cover_art_url: track.cover_art_url.clone(),
            sound_clip_url: track.sound_clip_url.clone(),
            created_at: track.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            updated_at: track.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
pub fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: rouille::Response,
) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(
        response.data.into_reader_and_size().0,
    )?)
}
