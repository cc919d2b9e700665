//! Database schema definitions for the catalog database

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- Artists discovered through genre search
CREATE TABLE IF NOT EXISTS artists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spotify_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    popularity INTEGER,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Genres reported for each artist
CREATE TABLE IF NOT EXISTS artist_genres (
    artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
    genre TEXT NOT NULL,
    UNIQUE(artist_id, genre)
);

CREATE INDEX IF NOT EXISTS idx_artist_genres_genre ON artist_genres(genre);

-- Albums, attached to the artist that led us to them
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spotify_id TEXT NOT NULL UNIQUE,
    artist_id INTEGER NOT NULL REFERENCES artists(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    total_tracks INTEGER NOT NULL DEFAULT 0,
    release_date TEXT,
    album_type TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);

-- Tracks; one row per (album, track number)
CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    spotify_id TEXT NOT NULL UNIQUE,
    album_id INTEGER NOT NULL REFERENCES albums(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    track_number INTEGER,
    disc_number INTEGER,
    duration_ms INTEGER,
    explicit INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(album_id, track_number)
);

CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
