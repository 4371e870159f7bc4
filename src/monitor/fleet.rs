use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tracing::{error, info};

use super::{MonitorContext, MonitorError};
use crate::{
    db::{fridges, models::NewFridge},
    hardware::DoorTransition,
};

/// The fleet a fresh install starts with.
fn default_fleet(now: DateTime<Utc>) -> [NewFridge; 2] {
    [
        NewFridge {
            name: "Main Refrigerator".into(),
            description: Some("Kitchen main refrigerator".into()),
            target_temp: 4.0,
            min_temp_threshold: 2.0,
            max_temp_threshold: 8.0,
            door_open_alert_seconds: 60,
            maintenance_interval_days: 365,
            last_maintenance_date: Some(now - TimeDelta::days(300)),
            sensor_pin: 4,
            door_sensor_pin: 17,
            relay_pin: 18,
        },
        NewFridge {
            name: "Freezer".into(),
            description: Some("Kitchen freezer".into()),
            target_temp: -18.0,
            min_temp_threshold: -22.0,
            max_temp_threshold: -15.0,
            door_open_alert_seconds: 30,
            maintenance_interval_days: 365,
            last_maintenance_date: Some(now - TimeDelta::days(250)),
            sensor_pin: 22,
            door_sensor_pin: 23,
            relay_pin: 24,
        },
    ]
}

/// Insert the default fleet when the `fridges` table is empty.
/// Returns whether anything was inserted.
pub async fn seed_default_fridges(pool: &SqlitePool, now: DateTime<Utc>) -> sqlx::Result<bool> {
    let mut tx = pool.begin().await?;
    if fridges::count(&mut *tx).await? > 0 {
        return Ok(false);
    }
    for fridge in default_fleet(now) {
        let created = fridges::insert(&mut *tx, &fridge, now).await?;
        info!(fridge_id = created.id, name = %created.name, "Seeded fridge");
    }
    tx.commit().await?;
    Ok(true)
}

impl MonitorContext {
    /// Configure pins for every stored fridge and route door edges to `events`.
    ///
    /// A fridge whose pins cannot be set up is logged and left unattached;
    /// the rest of the fleet is still monitored. Returns how many attached.
    pub async fn attach_fleet(
        &self,
        events: mpsc::Sender<DoorTransition>,
    ) -> Result<usize, MonitorError> {
        let fleet = fridges::list(self.pool()).await?;
        let mut attached = 0;
        for fridge in &fleet {
            match self.hardware().attach_fridge(fridge, events.clone()) {
                Ok(()) => {
                    attached += 1;
                    info!(
                        fridge_id = fridge.id,
                        name = %fridge.name,
                        sensor_pin = fridge.sensor_pin,
                        door_pin = fridge.door_sensor_pin,
                        relay_pin = fridge.relay_pin,
                        compressor = fridge.compressor_status,
                        "Fridge attached"
                    );
                }
                Err(e) => error!(fridge_id = fridge.id, error = %e, "Failed to set up fridge pins"),
            }
        }
        Ok(attached)
    }
}
