use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor};
use tracing::info;

use crate::db::{
    self,
    models::{Alert, AlertType},
};

/// Insert a new unacknowledged alert.
///
/// Does not look for duplicates; see [`emit_unless_active`].
pub async fn emit(
    executor: impl SqliteExecutor<'_>,
    fridge_id: i64,
    alert_type: AlertType,
    message: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<Alert> {
    let alert = db::alerts::insert(executor, fridge_id, alert_type, message, now).await?;
    info!(
        fridge_id,
        alert_id = alert.id,
        alert_type = %alert_type,
        message,
        "Created alert"
    );
    Ok(alert)
}

/// Emit an alert unless an unacknowledged one of the same type already exists
/// for the fridge. Returns the new alert, or `None` when it was skipped.
///
/// The lookup and the insert are separate statements; callers must hold the
/// monitor lock so no other emitter can run in between.
pub async fn emit_unless_active(
    conn: &mut SqliteConnection,
    fridge_id: i64,
    alert_type: AlertType,
    message: &str,
    now: DateTime<Utc>,
) -> sqlx::Result<Option<Alert>> {
    if db::alerts::find_active(&mut *conn, fridge_id, alert_type)
        .await?
        .is_some()
    {
        return Ok(None);
    }
    emit(&mut *conn, fridge_id, alert_type, message, now)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use sqlx::SqlitePool;

    use super::*;
    use crate::db::{fridges, models::NewFridge};

    #[sqlx::test(migrations = "./migrations")]
    async fn emit_always_inserts(pool: SqlitePool) {
        let now = Utc::now();
        let f = fridges::insert(&pool, &NewFridge::default(), now).await.unwrap();

        emit(&pool, f.id, AlertType::TempHigh, "hot", now).await.unwrap();
        emit(&pool, f.id, AlertType::TempHigh, "hot", now).await.unwrap();

        let active = db::alerts::active_for_fridge(&pool, f.id).await.unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|a| !a.acknowledged));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn emit_unless_active_skips_outstanding_duplicate(pool: SqlitePool) {
        let now = Utc::now();
        let f = fridges::insert(&pool, &NewFridge::default(), now).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = emit_unless_active(&mut conn, f.id, AlertType::DoorOpen, "open", now)
            .await
            .unwrap();
        let second = emit_unless_active(&mut conn, f.id, AlertType::DoorOpen, "open", now)
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(second.is_none());

        // A different type is not a duplicate.
        let other = emit_unless_active(&mut conn, f.id, AlertType::TempLow, "cold", now)
            .await
            .unwrap();
        assert!(other.is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn emit_unless_active_creates_again_after_acknowledgement(pool: SqlitePool) {
        let now = Utc::now();
        let f = fridges::insert(&pool, &NewFridge::default(), now).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let first = emit_unless_active(&mut conn, f.id, AlertType::MaintenanceDue, "due", now)
            .await
            .unwrap()
            .unwrap();
        db::alerts::acknowledge(&mut *conn, first.id).await.unwrap();

        let again = emit_unless_active(&mut conn, f.id, AlertType::MaintenanceDue, "due", now)
            .await
            .unwrap();
        assert!(again.is_some());
    }
}
