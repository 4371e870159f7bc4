use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::{Fridge, NewFridge};

const COLUMNS: &str = "id, name, description, target_temp, min_temp_threshold, \
     max_temp_threshold, door_open_alert_seconds, compressor_status, \
     maintenance_interval_days, last_maintenance_date, created_at, \
     sensor_pin, door_sensor_pin, relay_pin";

/// All fridges in id order, which is also the order the check loop visits them.
pub async fn list(executor: impl SqliteExecutor<'_>) -> sqlx::Result<Vec<Fridge>> {
    sqlx::query_as::<_, Fridge>(&format!("SELECT {COLUMNS} FROM fridges ORDER BY id"))
        .fetch_all(executor)
        .await
}

pub async fn find(executor: impl SqliteExecutor<'_>, id: i64) -> sqlx::Result<Option<Fridge>> {
    sqlx::query_as::<_, Fridge>(&format!("SELECT {COLUMNS} FROM fridges WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn count(executor: impl SqliteExecutor<'_>) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fridges")
        .fetch_one(executor)
        .await
}

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    fridge: &NewFridge,
    now: DateTime<Utc>,
) -> sqlx::Result<Fridge> {
    sqlx::query_as::<_, Fridge>(&format!(
        r#"
        INSERT INTO fridges
            (name, description, target_temp, min_temp_threshold, max_temp_threshold,
             door_open_alert_seconds, compressor_status, maintenance_interval_days,
             last_maintenance_date, created_at, sensor_pin, door_sensor_pin, relay_pin)
        VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $9, $10, $11, $12)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&fridge.name)
    .bind(&fridge.description)
    .bind(fridge.target_temp)
    .bind(fridge.min_temp_threshold)
    .bind(fridge.max_temp_threshold)
    .bind(fridge.door_open_alert_seconds)
    .bind(fridge.maintenance_interval_days)
    .bind(fridge.last_maintenance_date)
    .bind(now)
    .bind(fridge.sensor_pin)
    .bind(fridge.door_sensor_pin)
    .bind(fridge.relay_pin)
    .fetch_one(executor)
    .await
}

/// Writes every user-editable column of `fridge` back to its row.
pub async fn update_settings(
    executor: impl SqliteExecutor<'_>,
    fridge: &Fridge,
) -> sqlx::Result<Fridge> {
    sqlx::query_as::<_, Fridge>(&format!(
        r#"
        UPDATE fridges
        SET name = $2,
            description = $3,
            target_temp = $4,
            min_temp_threshold = $5,
            max_temp_threshold = $6,
            door_open_alert_seconds = $7,
            maintenance_interval_days = $8,
            sensor_pin = $9,
            door_sensor_pin = $10,
            relay_pin = $11
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(fridge.id)
    .bind(&fridge.name)
    .bind(&fridge.description)
    .bind(fridge.target_temp)
    .bind(fridge.min_temp_threshold)
    .bind(fridge.max_temp_threshold)
    .bind(fridge.door_open_alert_seconds)
    .bind(fridge.maintenance_interval_days)
    .bind(fridge.sensor_pin)
    .bind(fridge.door_sensor_pin)
    .bind(fridge.relay_pin)
    .fetch_one(executor)
    .await
}

pub async fn set_compressor_status(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    running: bool,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE fridges SET compressor_status = $2 WHERE id = $1")
        .bind(id)
        .bind(running)
        .execute(executor)
        .await?;
    Ok(())
}

/// Returns `false` when no fridge has the given id.
pub async fn set_last_maintenance_date(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    at: DateTime<Utc>,
) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE fridges SET last_maintenance_date = $2 WHERE id = $1")
        .bind(id)
        .bind(at)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
