//! Durable room persistence keyed by room id.

use std::str::FromStr;

use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use super::Room;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("stored room is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage seam for room state.
///
/// Implementations must make a completed [`save`](RoomStore::save) visible
/// to every later [`load`](RoomStore::load), including across process
/// restarts for the durable backends.
#[async_trait::async_trait]
pub trait RoomStore: Send + Sync {
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError>;
    async fn save(&self, room: &Room) -> Result<(), StoreError>;
    async fn delete(&self, room_id: &str) -> Result<(), StoreError>;
    /// Ids of rooms whose `last_activity` is strictly before `cutoff_ms`.
    async fn idle_room_ids(&self, cutoff_ms: i64) -> Result<Vec<String>, StoreError>;
}

/// SQLite-backed store. Room state lives as a JSON blob per row with
/// `last_activity` denormalized into its own column for the eviction scan.
pub struct SqliteRoomStore {
    pool: SqlitePool,
}

impl SqliteRoomStore {
    pub async fn connect(url: &str) -> Result<SqliteRoomStore, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(&pool).await?;
        Ok(SqliteRoomStore { pool })
    }

    /// Private in-memory database, one connection so every handle sees the
    /// same data.
    pub async fn in_memory() -> Result<SqliteRoomStore, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::migrate(&pool).await?;
        Ok(SqliteRoomStore { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rooms (
                room_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                last_activity INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS rooms_last_activity ON rooms (last_activity)")
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RoomStore for SqliteRoomStore {
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        let row = sqlx::query("SELECT state FROM rooms WHERE room_id = ?")
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let state: String = row.try_get("state")?;
                Ok(Some(serde_json::from_str(&state)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, room: &Room) -> Result<(), StoreError> {
        let state = serde_json::to_string(room)?;
        sqlx::query(
            "INSERT INTO rooms (room_id, state, last_activity) VALUES (?, ?, ?)
             ON CONFLICT(room_id) DO UPDATE
             SET state = excluded.state, last_activity = excluded.last_activity",
        )
        .bind(&room.room_id)
        .bind(state)
        .bind(room.last_activity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM rooms WHERE room_id = ?")
            .bind(room_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn idle_room_ids(&self, cutoff_ms: i64) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT room_id FROM rooms WHERE last_activity < ?")
            .bind(cutoff_ms)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<String, _>("room_id").map_err(StoreError::from))
            .collect()
    }
}

/// Map-backed store without durability, for tests and throwaway servers.
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: DashMap<String, Room>,
}

impl MemoryRoomStore {
    pub fn new() -> MemoryRoomStore {
        MemoryRoomStore::default()
    }
}

#[async_trait::async_trait]
impl RoomStore for MemoryRoomStore {
    async fn load(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.rooms.get(room_id).map(|entry| entry.clone()))
    }

    async fn save(&self, room: &Room) -> Result<(), StoreError> {
        self.rooms.insert(room.room_id.clone(), room.clone());
        Ok(())
    }

    async fn delete(&self, room_id: &str) -> Result<(), StoreError> {
        self.rooms.remove(room_id);
        Ok(())
    }

    async fn idle_room_ids(&self, cutoff_ms: i64) -> Result<Vec<String>, StoreError> {
        Ok(self
            .rooms
            .iter()
            .filter(|entry| entry.last_activity < cutoff_ms)
            .map(|entry| entry.key().clone())
            .collect())
    }
}
