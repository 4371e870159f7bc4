use chrono::{DateTime, Utc};
use sqlx::SqliteExecutor;

use super::models::MaintenanceRecord;

const COLUMNS: &str = "id, fridge_id, maintenance_date, description, performed_by";

pub async fn insert(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    description: &str,
    performed_by: &str,
    at: DateTime<Utc>,
) -> sqlx::Result<MaintenanceRecord> {
    sqlx::query_as::<_, MaintenanceRecord>(&format!(
        r#"
        INSERT INTO maintenance_records (fridge_id, maintenance_date, description, performed_by)
        VALUES ($1, $2, $3, $4)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(fridge_id)
    .bind(at)
    .bind(description)
    .bind(performed_by)
    .fetch_one(executor)
    .await
}

/// Maintenance history, newest first.
pub async fn history(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
) -> sqlx::Result<Vec<MaintenanceRecord>> {
    sqlx::query_as::<_, MaintenanceRecord>(&format!(
        r#"
        SELECT {COLUMNS}
        FROM maintenance_records
        WHERE fridge_id = $1
        ORDER BY maintenance_date DESC, id DESC
        "#
    ))
    .bind(fridge_id)
    .fetch_all(executor)
    .await
}
