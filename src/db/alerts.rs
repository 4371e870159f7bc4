use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::{Alert, AlertType};

const COLUMNS: &str = "id, fridge_id, alert_type, message, created_at, acknowledged";

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    alert_type: AlertType,
    message: &str,
    at: DateTime<Utc>,
) -> sqlx::Result<Alert> {
    sqlx::query_as::<_, Alert>(&format!(
        r#"
        INSERT INTO alerts (fridge_id, alert_type, message, created_at, acknowledged)
        VALUES ($1, $2, $3, $4, 0)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(fridge_id)
    .bind(alert_type)
    .bind(message)
    .bind(at)
    .fetch_one(executor)
    .await
}

pub async fn find(executor: impl SqliteExecutor<'_>, id: i64) -> sqlx::Result<Option<Alert>> {
    sqlx::query_as::<_, Alert>(&format!("SELECT {COLUMNS} FROM alerts WHERE id = $1"))
        .bind(id)
        .fetch_optional(executor)
        .await
}

/// An unacknowledged alert of `alert_type` for the fridge, if one exists.
pub async fn find_active(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    alert_type: AlertType,
) -> sqlx::Result<Option<Alert>> {
    sqlx::query_as::<_, Alert>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM alerts
        WHERE fridge_id = $1
          AND alert_type = $2
          AND acknowledged = 0
        ORDER BY id
        LIMIT 1
        "#
    ))
    .bind(fridge_id)
    .bind(alert_type)
    .fetch_optional(executor)
    .await
}

/// Unacknowledged alerts for the fridge, newest first.
pub async fn active_for_fridge(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
) -> sqlx::Result<Vec<Alert>> {
    sqlx::query_as::<_, Alert>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM alerts
        WHERE fridge_id = $1
          AND acknowledged = 0
        ORDER BY created_at DESC, id DESC
        "#
    ))
    .bind(fridge_id)
    .fetch_all(executor)
    .await
}

/// Most recent alerts regardless of acknowledgement, newest first.
pub async fn recent_for_fridge(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    limit: i64,
) -> sqlx::Result<Vec<Alert>> {
    sqlx::query_as::<_, Alert>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM alerts
        WHERE fridge_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#
    ))
    .bind(fridge_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}

/// Returns `false` when no alert has the given id.
pub async fn acknowledge(executor: impl SqliteExecutor<'_>, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE alerts SET acknowledged = 1 WHERE id = $1")
        .bind(id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Acknowledges every outstanding alert of `alert_type` for the fridge.
pub async fn acknowledge_active(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    alert_type: AlertType,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE alerts
        SET acknowledged = 1
        WHERE fridge_id = $1
          AND alert_type = $2
          AND acknowledged = 0
        "#,
    )
    .bind(fridge_id)
    .bind(alert_type)
    .execute(executor)
    .await?;
    Ok(result.rows_affected())
}

/// Only acknowledged alerts are eligible; outstanding ones are kept forever.
pub async fn delete_acknowledged_older_than(
    executor: impl SqliteExecutor<'_>,
    cutoff: DateTime<Utc>,
) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM alerts WHERE acknowledged = 1 AND created_at < $1")
        .bind(cutoff)
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}
