//! SQLite-backed record store for ingested events
//!
//! Rows are keyed by `(source_system, id)`. Timestamps are stored as fixed
//! width UTC strings so `MAX(created_at)` orders chronologically.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::domain::events::{Event, EventId, SourceSystem};
use crate::domain::repositories::EventRepository;

fn encode_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {raw}"))
}

#[derive(Clone)]
pub struct SqliteEventRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Number of stored events for `system`
    pub async fn count(&self, system: SourceSystem) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE source_system = ?")
            .bind(system)
            .fetch_one(&*self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl EventRepository for SqliteEventRepository {
    async fn latest_timestamp(&self, system: SourceSystem) -> Result<Option<DateTime<Utc>>> {
        let latest: Option<String> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM events WHERE source_system = ?")
                .bind(system)
                .fetch_one(&*self.pool)
                .await?;
        latest.as_deref().map(decode_timestamp).transpose()
    }

    async fn list_ids(&self, system: SourceSystem) -> Result<BTreeSet<EventId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM events WHERE source_system = ? ORDER BY id ASC")
                .bind(system)
                .fetch_all(&*self.pool)
                .await?;
        Ok(ids.into_iter().collect())
    }

    async fn upsert(&self, events: &[Event]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let ingested_at = encode_timestamp(Utc::now());
        let mut tx = self.pool.begin().await?;
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO events (source_system, id, created_at, payload, ingested_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (source_system, id) DO UPDATE SET
                    created_at = excluded.created_at,
                    payload = excluded.payload,
                    ingested_at = excluded.ingested_at
                "#,
            )
            .bind(event.source_system)
            .bind(event.id)
            .bind(encode_timestamp(event.created_at))
            .bind(serde_json::to_string(&event.payload)?)
            .bind(&ingested_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!("Upserted {} events", events.len());
        Ok(events.len() as u64)
    }

    async fn find_event(&self, system: SourceSystem, id: EventId) -> Result<Option<Event>> {
        let row = sqlx::query(
            "SELECT source_system, id, created_at, payload FROM events WHERE source_system = ? AND id = ?",
        )
        .bind(system)
        .bind(id)
        .fetch_optional(&*self.pool)
        .await?;

        row.map(|row| -> Result<Event> {
            let created_at: String = row.try_get("created_at")?;
            let payload: String = row.try_get("payload")?;
            Ok(Event {
                id: row.try_get("id")?,
                source_system: row.try_get("source_system")?,
                created_at: decode_timestamp(&created_at)?,
                payload: serde_json::from_str(&payload)?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::DatabaseConnection;
    use chrono::TimeZone;
    use serde_json::json;

    async fn repository() -> SqliteEventRepository {
        let db = DatabaseConnection::new("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        SqliteEventRepository::new(db.pool().clone())
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn latest_timestamp_is_absent_for_empty_source() {
        let repo = repository().await;
        assert!(repo.latest_timestamp(SourceSystem::Famly).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn latest_timestamp_is_per_source() {
        let repo = repository().await;
        repo.upsert(&[
            Event::new(1, SourceSystem::Famly, at(1, 9)),
            Event::new(2, SourceSystem::Famly, at(3, 7)),
            Event::new(3, SourceSystem::Famly, at(2, 23)),
            Event::new(1, SourceSystem::BabyConnect, at(9, 0)),
        ])
        .await
        .unwrap();

        assert_eq!(repo.latest_timestamp(SourceSystem::Famly).await.unwrap(), Some(at(3, 7)));
        assert_eq!(
            repo.latest_timestamp(SourceSystem::BabyConnect).await.unwrap(),
            Some(at(9, 0))
        );
    }

    #[tokio::test]
    async fn upsert_overwrites_instead_of_duplicating() {
        let repo = repository().await;
        repo.upsert(&[Event::new(7, SourceSystem::Famly, at(1, 8)).with_payload(json!({"kind": "nap"}))])
            .await
            .unwrap();
        repo.upsert(&[Event::new(7, SourceSystem::Famly, at(1, 8)).with_payload(json!({"kind": "meal"}))])
            .await
            .unwrap();

        assert_eq!(repo.count(SourceSystem::Famly).await.unwrap(), 1);
        let stored = repo.find_event(SourceSystem::Famly, 7).await.unwrap().unwrap();
        assert_eq!(stored.payload, json!({"kind": "meal"}));
        assert_eq!(stored.created_at, at(1, 8));
    }

    #[tokio::test]
    async fn same_id_in_different_sources_is_distinct() {
        let repo = repository().await;
        repo.upsert(&[
            Event::new(5, SourceSystem::Famly, at(1, 1)),
            Event::new(5, SourceSystem::BabyConnect, at(1, 2)),
        ])
        .await
        .unwrap();

        assert_eq!(repo.list_ids(SourceSystem::Famly).await.unwrap(), BTreeSet::from([5]));
        assert_eq!(repo.list_ids(SourceSystem::BabyConnect).await.unwrap(), BTreeSet::from([5]));
        assert!(repo.find_event(SourceSystem::Famly, 6).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let repo = repository().await;
        assert_eq!(repo.upsert(&[]).await.unwrap(), 0);
        assert!(repo.list_ids(SourceSystem::Famly).await.unwrap().is_empty());
    }
}
