use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::chat::{Delivery, Participant};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    gender TEXT NOT NULL,
    is_guest INTEGER NOT NULL,
    is_online INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    messages_sent INTEGER NOT NULL DEFAULT 0,
    messages_received INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    room_id TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    text TEXT,
    image_ref TEXT,
    sent_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS messages_room ON messages (room_id);
"#;

/// Write-only sink for profiles and the message log.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

fn rfc3339(at: OffsetDateTime) -> anyhow::Result<String> {
    Ok(at.format(&Rfc3339)?)
}

impl Store {
    pub async fn connect(url: &str) -> anyhow::Result<Store> {
        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect(url)
            .await?;
        Store::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> anyhow::Result<Store> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Store { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_profile(&self, participant: &Participant) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id,name,gender,is_guest,is_online,created_at,last_seen) VALUES (?,?,?,?,?,?,?)
             ON CONFLICT(id) DO UPDATE SET name=excluded.name, gender=excluded.gender, is_guest=excluded.is_guest,
             is_online=excluded.is_online, last_seen=excluded.last_seen",
        )
        .bind(participant.id.to_string())
        .bind(&participant.name)
        .bind(participant.gender.as_str())
        .bind(participant.is_guest)
        .bind(participant.online)
        .bind(rfc3339(participant.created_at)?)
        .bind(rfc3339(participant.last_seen)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_offline(&self, participant: &Participant) -> anyhow::Result<()> {
        sqlx::query("UPDATE profiles SET is_online=0, last_seen=? WHERE id=?")
            .bind(rfc3339(participant.last_seen)?)
            .bind(participant.id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Appends to the room's log and bumps both sides' counters.
    pub async fn append_message(&self, delivery: &Delivery) -> anyhow::Result<()> {
        let event = &delivery.event;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO messages (room_id,sender_id,sender_name,text,image_ref,sent_at) VALUES (?,?,?,?,?,?)")
            .bind(event.room_id.to_string())
            .bind(event.sender_id.to_string())
            .bind(&event.sender_name)
            .bind(&event.text)
            .bind(&event.image_ref)
            .bind(rfc3339(event.timestamp)?)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE profiles SET messages_sent=messages_sent+1 WHERE id=?")
            .bind(event.sender_id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE profiles SET messages_received=messages_received+1 WHERE id=?")
            .bind(delivery.recipient.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
