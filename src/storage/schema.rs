use rusqlite::Connection;

pub mod tables {
    pub const TRACKS: &str = "tracks";

    pub const ALL_TABLES: &[&str] = &[TRACKS];
}

pub mod columns {
    pub const SEQ: &str = "seq";
    pub const TRACK_ID: &str = "track_id";
    pub const TITLE: &str = "title";
    pub const ARTIST: &str = "artist";
    pub const TITLE_KEY: &str = "title_key";
    pub const ARTIST_KEY: &str = "artist_key";
    pub const COVER_ART_URL: &str = "cover_art_url";
    pub const SOUND_CLIP_URL: &str = "sound_clip_url";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

pub use columns::*;
pub use tables::*;

// title_key and artist_key hold the lowercased title and artist,
// so uniqueness ignores case for any script
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tracks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    track_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    artist TEXT NOT NULL,
    title_key TEXT NOT NULL,
    artist_key TEXT NOT NULL,
    cover_art_url TEXT,
    sound_clip_url TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS tracks_title_artist
    ON tracks (title_key, artist_key);
"#;

/// Folds a trimmed title or artist into the form the unique index compares
pub fn match_key(value: &str) -> String {
    value.to_lowercase()
}

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
