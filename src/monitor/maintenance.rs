use chrono::{DateTime, Utc};
use tracing::info;

use super::{MonitorContext, MonitorError};
use crate::db::{
    alerts, fridges, maintenance,
    models::{AlertType, MaintenanceRecord},
};

impl MonitorContext {
    pub async fn acknowledge_alert(&self, alert_id: i64) -> Result<(), MonitorError> {
        let _guard = self.lock().await;
        if !alerts::acknowledge(self.pool(), alert_id).await? {
            return Err(MonitorError::AlertNotFound(alert_id));
        }
        info!(alert_id, "Alert acknowledged");
        Ok(())
    }

    /// Record a service visit: stores the record, restarts the maintenance
    /// interval at `now` and acknowledges outstanding `maintenance_due` alerts.
    pub async fn log_maintenance(
        &self,
        fridge_id: i64,
        description: &str,
        performed_by: &str,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceRecord, MonitorError> {
        let _guard = self.lock().await;
        let mut tx = self.pool().begin().await?;

        let cleared = restart_interval(&mut tx, fridge_id, now).await?;
        let record =
            maintenance::insert(&mut *tx, fridge_id, description, performed_by, now).await?;
        tx.commit().await?;

        info!(fridge_id, record_id = record.id, performed_by, cleared, "Maintenance logged");
        Ok(record)
    }

    /// Same as [`log_maintenance`](Self::log_maintenance) without storing a record.
    pub async fn reset_maintenance_date(
        &self,
        fridge_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), MonitorError> {
        let _guard = self.lock().await;
        let mut tx = self.pool().begin().await?;
        let cleared = restart_interval(&mut tx, fridge_id, now).await?;
        tx.commit().await?;

        info!(fridge_id, cleared, "Maintenance date reset");
        Ok(())
    }
}

async fn restart_interval(
    conn: &mut sqlx::SqliteConnection,
    fridge_id: i64,
    now: DateTime<Utc>,
) -> Result<u64, MonitorError> {
    if !fridges::set_last_maintenance_date(&mut *conn, fridge_id, now).await? {
        return Err(MonitorError::FridgeNotFound(fridge_id));
    }
    Ok(alerts::acknowledge_active(&mut *conn, fridge_id, AlertType::MaintenanceDue).await?)
}
