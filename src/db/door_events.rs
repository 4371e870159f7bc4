use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::{DoorEvent, DoorEventType};

const COLUMNS: &str = "id, fridge_id, event_type, recorded_at";

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    event_type: DoorEventType,
    at: DateTime<Utc>,
) -> sqlx::Result<DoorEvent> {
    sqlx::query_as::<_, DoorEvent>(&format!(
        r#"
        INSERT INTO door_events (fridge_id, event_type, recorded_at)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(fridge_id)
    .bind(event_type)
    .bind(at)
    .fetch_one(executor)
    .await
}

/// Most recent event, optionally restricted to one event type.
pub async fn latest(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    event_type: Option<DoorEventType>,
) -> sqlx::Result<Option<DoorEvent>> {
    sqlx::query_as::<_, DoorEvent>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM door_events
        WHERE fridge_id = $1
          AND ($2 IS NULL OR event_type = $2)
        ORDER BY recorded_at DESC, id DESC
        LIMIT 1
        "#
    ))
    .bind(fridge_id)
    .bind(event_type)
    .fetch_optional(executor)
    .await
}

/// Events of one type in `[from, to)`, oldest first.
pub async fn between(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    event_type: DoorEventType,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> sqlx::Result<Vec<DoorEvent>> {
    sqlx::query_as::<_, DoorEvent>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM door_events
        WHERE fridge_id = $1
          AND event_type = $2
          AND recorded_at >= $3
          AND recorded_at < $4
        ORDER BY recorded_at ASC, id ASC
        "#
    ))
    .bind(fridge_id)
    .bind(event_type)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
}

pub async fn delete_older_than(
    executor: impl SqliteExecutor<'_>,
    cutoff: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM door_events WHERE recorded_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
