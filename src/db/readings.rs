use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::TemperatureReading;

const COLUMNS: &str = "id, fridge_id, temperature, humidity, recorded_at";

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    temperature: f64,
    humidity: f64,
    at: DateTime<Utc>,
) -> sqlx::Result<TemperatureReading> {
    sqlx::query_as::<_, TemperatureReading>(&format!(
        r#"
        INSERT INTO temperature_readings (fridge_id, temperature, humidity, recorded_at)
        VALUES ($1, $2, $3, $4)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(fridge_id)
    .bind(temperature)
    .bind(humidity)
    .bind(at)
    .fetch_one(executor)
    .await
}

/// The `limit` most recent readings, newest first.
pub async fn recent(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<TemperatureReading>> {
    sqlx::query_as::<_, TemperatureReading>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM temperature_readings
        WHERE fridge_id = $1
        ORDER BY recorded_at DESC, id DESC
        LIMIT $2
        "#
    ))
    .bind(fridge_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}

pub async fn latest(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
) -> sqlx::Result<Option<TemperatureReading>> {
    Ok(recent(executor, fridge_id, 1).await?.into_iter().next())
}

/// Readings in `[from, to)`, oldest first.
pub async fn between(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> sqlx::Result<Vec<TemperatureReading>> {
    sqlx::query_as::<_, TemperatureReading>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM temperature_readings
        WHERE fridge_id = $1
          AND recorded_at >= $2
          AND recorded_at < $3
        ORDER BY recorded_at ASC, id ASC
        "#
    ))
    .bind(fridge_id)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
}

/// Readings strictly newer than `cutoff`, oldest first.
pub async fn since(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    cutoff: DateTime<Utc>,
) -> sqlx::Result<Vec<TemperatureReading>> {
    sqlx::query_as::<_, TemperatureReading>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM temperature_readings
        WHERE fridge_id = $1
          AND recorded_at > $2
        ORDER BY recorded_at ASC, id ASC
        "#
    ))
    .bind(fridge_id)
    .bind(cutoff)
    .fetch_all(executor)
    .await
}

/// First reading after `after` at or below `target`, used to measure recovery.
pub async fn first_at_or_below_after(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    target: f64,
    after: DateTime<Utc>,
) -> sqlx::Result<Option<TemperatureReading>> {
    sqlx::query_as::<_, TemperatureReading>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM temperature_readings
        WHERE fridge_id = $1
          AND temperature <= $2
          AND recorded_at > $3
        ORDER BY recorded_at ASC, id ASC
        LIMIT 1
        "#
    ))
    .bind(fridge_id)
    .bind(target)
    .bind(after)
    .fetch_optional(executor)
    .await
}

pub async fn delete_older_than(
    executor: impl SqliteExecutor<'_>,
    cutoff: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM temperature_readings WHERE recorded_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
