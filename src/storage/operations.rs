use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{OptionalExtension, Row, Transaction, params};

use crate::{
    config,
    domain::{
        id::TrackId,
        track::{NewTrack, Track, TrackChanges},
    },
    storage::{
        db::{self, millis_to_time, time_to_millis},
        error::StorageError,
        schema::{columns, match_key, tables},
    },
};

use anyhow::anyhow;
use columns::*;
use tables::*;

/// Main structure that implements all storage logic
pub struct Storage {
    pub(crate) db: rusqlite::Connection,
}

fn select_track_sql() -> String {
    format!(
        "SELECT {TRACK_ID}, {TITLE}, {ARTIST}, {COVER_ART_URL}, {SOUND_CLIP_URL}, \
         {CREATED_AT}, {UPDATED_AT} FROM {TRACKS}"
    )
}

/// Raw row, converted to [`Track`] outside of rusqlite's row callback
struct TrackRow {
    track_id: String,
    title: String,
    artist: String,
    cover_art_url: Option<String>,
    sound_clip_url: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TrackRow {
    fn read(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            track_id: row.get(0)?,
            title: row.get(1)?,
            artist: row.get(2)?,
            cover_art_url: row.get(3)?,
            sound_clip_url: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_track(self) -> Result<Track, StorageError> {
        let id = TrackId::parse(&self.track_id).map_err(|e| {
            StorageError::Internal(anyhow!(
                "table {TRACKS} contains invalid track id {}: {e}",
                self.track_id
            ))
        })?;

        Ok(Track {
            id,
            title: self.title,
            artist: self.artist,
            cover_art_url: self.cover_art_url,
            sound_clip_url: self.sound_clip_url,
            created_at: millis_to_time(self.created_at)?,
            updated_at: millis_to_time(self.updated_at)?,
        })
    }
}

fn find_track(tx: &Transaction<'_>, track_id: TrackId) -> Result<Option<Track>, StorageError> {
    let row = tx
        .query_row(
            &format!("{} WHERE {TRACK_ID} = ?1", select_track_sql()),
            params![track_id.to_hex()],
            TrackRow::read,
        )
        .optional()?;

    row.map(TrackRow::into_track).transpose()
}

impl Storage {
    /// when called, opens a data base connection
    pub fn new(db_config: &config::Database) -> Result<Self, StorageError> {
        let db: rusqlite::Connection = db::open(db_config)?;
        Ok(Self::from_existing_conn(db))
    }

    pub fn from_existing_conn(db: rusqlite::Connection) -> Self {
        Self { db }
    }

    /// Validates and inserts a new track.
    ///
    /// Fails with [`StorageError::DuplicateTrack`] when a track with the same
    /// title and artist (ignoring case) already exists.
    pub fn create_track(&mut self, new: NewTrack) -> Result<Track, StorageError> {
        self.create_track_at(new, Utc::now())
    }

    fn create_track_at(&mut self, new: NewTrack, now: DateTime<Utc>) -> Result<Track, StorageError> {
        // stored with millisecond precision
        let now = now.trunc_subsecs(3);
        let new = new.validated()?;
        let track = Track {
            id: TrackId::generate(),
            title: new.title,
            artist: new.artist,
            cover_art_url: new.cover_art_url,
            sound_clip_url: new.sound_clip_url,
            created_at: now,
            updated_at: now,
        };

        self.db
            .execute(
                &format!(
                    "INSERT INTO {TRACKS} ({TRACK_ID}, {TITLE}, {ARTIST}, {TITLE_KEY}, \
                     {ARTIST_KEY}, {COVER_ART_URL}, {SOUND_CLIP_URL}, {CREATED_AT}, \
                     {UPDATED_AT}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
                ),
                params![
                    track.id.to_hex(),
                    track.title,
                    track.artist,
                    match_key(&track.title),
                    match_key(&track.artist),
                    track.cover_art_url,
                    track.sound_clip_url,
                    time_to_millis(track.created_at),
                    time_to_millis(track.updated_at),
                ],
            )
            .map_err(|e| StorageError::from_write(e, &track.title, &track.artist))?;

        Ok(track)
    }

    /// All tracks, newest first
    pub fn list_tracks(&mut self) -> Result<Vec<Track>, StorageError> {
        let mut stmt = self.db.prepare(&format!(
            "{} ORDER BY {CREATED_AT} DESC, {SEQ} DESC",
            select_track_sql()
        ))?;

        let rows = stmt
            .query_map([], TrackRow::read)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(TrackRow::into_track).collect()
    }

    pub fn get_track(&mut self, track_id: TrackId) -> Result<Track, StorageError> {
        let tx = self.db.transaction()?;
        let track = find_track(&tx, track_id)?;
        tx.commit()?;

        track.ok_or(StorageError::TrackNotFound(track_id))
    }

    /// Applies `changes` to the stored track and validates the result
    /// before writing it.
    pub fn update_track(
        &mut self,
        track_id: TrackId,
        changes: &TrackChanges,
    ) -> Result<Track, StorageError> {
        self.update_track_at(track_id, changes, Utc::now())
    }

    fn update_track_at(
        &mut self,
        track_id: TrackId,
        changes: &TrackChanges,
        now: DateTime<Utc>,
    ) -> Result<Track, StorageError> {
        let now = now.trunc_subsecs(3);
        let tx = self.db.transaction()?;

        let existing = find_track(&tx, track_id)?.ok_or(StorageError::TrackNotFound(track_id))?;
        let merged = changes.apply_to(&existing).validated()?;

        tx.execute(
            &format!(
                "UPDATE {TRACKS} SET {TITLE} = ?1, {ARTIST} = ?2, {TITLE_KEY} = ?3, \
                 {ARTIST_KEY} = ?4, {COVER_ART_URL} = ?5, {SOUND_CLIP_URL} = ?6, \
                 {UPDATED_AT} = ?7 WHERE {TRACK_ID} = ?8"
            ),
            params![
                merged.title,
                merged.artist,
                match_key(&merged.title),
                match_key(&merged.artist),
                merged.cover_art_url,
                merged.sound_clip_url,
                time_to_millis(now),
                track_id.to_hex(),
            ],
        )
        .map_err(|e| StorageError::from_write(e, &merged.title, &merged.artist))?;

        tx.commit()?;

        Ok(Track {
            id: track_id,
            title: merged.title,
            artist: merged.artist,
            cover_art_url: merged.cover_art_url,
            sound_clip_url: merged.sound_clip_url,
            created_at: existing.created_at,
            updated_at: now,
        })
    }

    /// removes the track and returns what was stored
    pub fn delete_track(&mut self, track_id: TrackId) -> Result<Track, StorageError> {
        let tx = self.db.transaction()?;

        let track = find_track(&tx, track_id)?.ok_or(StorageError::TrackNotFound(track_id))?;

        tx.execute(
            &format!("DELETE FROM {TRACKS} WHERE {TRACK_ID} = ?1"),
            params![track_id.to_hex()],
        )?;

        tx.commit()?;
        Ok(track)
    }
}
