//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CatalogStore trait.

use crate::api::{AlbumPayload, ArtistPayload, TrackPayload};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CatalogStore, StorageError, StorageResult};
use crate::storage::{AlbumRecord, UpsertOutcome};
use crate::CrawlError;
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;

/// Predicate over an `albums a` row: stored distinct track numbers cover the
/// declared total
const ALBUM_HYDRATED_SQL: &str = "(a.total_tracks > 0 AND \
     (SELECT COUNT(DISTINCT t.track_number) FROM tracks t \
      WHERE t.album_id = a.id AND t.track_number IS NOT NULL) >= a.total_tracks)";

/// SQLite storage backend
pub struct SqliteCatalogStore {
    conn: Connection,
}

impl SqliteCatalogStore {
    /// Opens or creates the catalog database at `path`
    pub fn new(path: &Path) -> Result<Self, CrawlError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, CrawlError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn lookup_id(&self, table: &str, spotify_id: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE spotify_id = ?1", table),
                params![spotify_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn string_column(&self, sql: &str) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(sql)?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}

/// Turns uniqueness failures into [`StorageError::ConstraintViolation`]
fn map_constraint(err: rusqlite::Error, context: &str) -> StorageError {
    match &err {
        rusqlite::Error::SqliteFailure(e, msg) if e.code == ErrorCode::ConstraintViolation => {
            StorageError::ConstraintViolation(format!(
                "{}: {}",
                context,
                msg.as_deref().unwrap_or("constraint failed")
            ))
        }
        _ => StorageError::Sqlite(err),
    }
}

impl CatalogStore for SqliteCatalogStore {
    // ===== Upserts =====

    fn upsert_artist(&mut self, artist: &ArtistPayload) -> StorageResult<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM artists WHERE spotify_id = ?1",
                params![artist.id],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE artists SET name = ?1, popularity = ?2, updated_at = ?3 WHERE id = ?4",
                    params![artist.name, artist.popularity, now, id],
                )?;
                UpsertOutcome { id, created: false }
            }
            None => {
                tx.execute(
                    "INSERT INTO artists (spotify_id, name, popularity, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![artist.id, artist.name, artist.popularity, now],
                )
                .map_err(|e| map_constraint(e, &artist.id))?;
                UpsertOutcome {
                    id: tx.last_insert_rowid(),
                    created: true,
                }
            }
        };

        tx.execute(
            "DELETE FROM artist_genres WHERE artist_id = ?1",
            params![outcome.id],
        )?;
        for genre in &artist.genres {
            tx.execute(
                "INSERT OR IGNORE INTO artist_genres (artist_id, genre) VALUES (?1, ?2)",
                params![outcome.id, genre],
            )?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn upsert_album(
        &mut self,
        album: &AlbumPayload,
        artist_row_id: i64,
    ) -> StorageResult<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();

        if let Some(id) = self.lookup_id("albums", &album.id)? {
            // The owning artist is whoever stored the album first
            self.conn.execute(
                "UPDATE albums SET name = ?1, total_tracks = ?2, release_date = ?3,
                 album_type = ?4, updated_at = ?5 WHERE id = ?6",
                params![
                    album.name,
                    album.total_tracks,
                    album.release_date,
                    album.album_type,
                    now,
                    id
                ],
            )?;
            return Ok(UpsertOutcome { id, created: false });
        }

        self.conn
            .execute(
                "INSERT INTO albums (spotify_id, artist_id, name, total_tracks, release_date,
                 album_type, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    album.id,
                    artist_row_id,
                    album.name,
                    album.total_tracks,
                    album.release_date,
                    album.album_type,
                    now
                ],
            )
            .map_err(|e| map_constraint(e, &album.id))?;

        Ok(UpsertOutcome {
            id: self.conn.last_insert_rowid(),
            created: true,
        })
    }

    fn upsert_track(
        &mut self,
        track: &TrackPayload,
        album_row_id: i64,
    ) -> StorageResult<UpsertOutcome> {
        let now = Utc::now().to_rfc3339();
        let duration_ms = track.duration_ms.map(|ms| ms as i64);

        if let Some(id) = self.lookup_id("tracks", &track.id)? {
            self.conn
                .execute(
                    "UPDATE tracks SET album_id = ?1, name = ?2, track_number = ?3,
                     disc_number = ?4, duration_ms = ?5, explicit = ?6, updated_at = ?7
                     WHERE id = ?8",
                    params![
                        album_row_id,
                        track.name,
                        track.track_number,
                        track.disc_number,
                        duration_ms,
                        track.explicit,
                        now,
                        id
                    ],
                )
                .map_err(|e| map_constraint(e, &track.id))?;
            return Ok(UpsertOutcome { id, created: false });
        }

        self.conn
            .execute(
                "INSERT INTO tracks (spotify_id, album_id, name, track_number, disc_number,
                 duration_ms, explicit, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    track.id,
                    album_row_id,
                    track.name,
                    track.track_number,
                    track.disc_number,
                    duration_ms,
                    track.explicit,
                    now
                ],
            )
            .map_err(|e| map_constraint(e, &track.id))?;

        Ok(UpsertOutcome {
            id: self.conn.last_insert_rowid(),
            created: true,
        })
    }

    // ===== Lookups =====

    fn find_album(&self, spotify_id: &str) -> StorageResult<Option<AlbumRecord>> {
        let album = self
            .conn
            .query_row(
                "SELECT id, spotify_id, artist_id, name, total_tracks FROM albums
                 WHERE spotify_id = ?1",
                params![spotify_id],
                |row| {
                    Ok(AlbumRecord {
                        id: row.get(0)?,
                        spotify_id: row.get(1)?,
                        artist_id: row.get(2)?,
                        name: row.get(3)?,
                        total_tracks: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(album)
    }

    fn album_track_count(&self, album_row_id: i64) -> StorageResult<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(DISTINCT track_number) FROM tracks
             WHERE album_id = ?1 AND track_number IS NOT NULL",
            params![album_row_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn track_exists(&self, spotify_id: &str) -> StorageResult<bool> {
        Ok(self.lookup_id("tracks", spotify_id)?.is_some())
    }

    fn hydrated_album_ids(&self) -> StorageResult<Vec<String>> {
        self.string_column(&format!(
            "SELECT a.spotify_id FROM albums a WHERE {} ORDER BY a.spotify_id",
            ALBUM_HYDRATED_SQL
        ))
    }

    fn hydrated_artist_ids(&self) -> StorageResult<Vec<String>> {
        self.string_column(&format!(
            "SELECT ar.spotify_id FROM artists ar
             WHERE EXISTS (SELECT 1 FROM albums a WHERE a.artist_id = ar.id)
             AND NOT EXISTS (SELECT 1 FROM albums a WHERE a.artist_id = ar.id AND NOT {})
             ORDER BY ar.spotify_id",
            ALBUM_HYDRATED_SQL
        ))
    }

    // ===== Statistics =====

    fn count_artists(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM artists")
    }

    fn count_albums(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM albums")
    }

    fn count_tracks(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM tracks")
    }

    fn count_unhydrated_albums(&self) -> StorageResult<u64> {
        self.count(&format!(
            "SELECT COUNT(*) FROM albums a WHERE NOT {}",
            ALBUM_HYDRATED_SQL
        ))
    }

    fn count_unhydrated_artists(&self) -> StorageResult<u64> {
        self.count(&format!(
            "SELECT COUNT(*) FROM artists ar
             WHERE NOT EXISTS (SELECT 1 FROM albums a WHERE a.artist_id = ar.id)
             OR EXISTS (SELECT 1 FROM albums a WHERE a.artist_id = ar.id AND NOT {})",
            ALBUM_HYDRATED_SQL
        ))
    }
}
