use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::{MonitorContext, MonitorError};
use crate::db::{fridges, models::Fridge};

pub const RESTART_WARNING: &str =
    "Hardware pin changes require restarting the application to take effect";
pub const THRESHOLD_WARNING: &str =
    "Thresholds should satisfy min_temp_threshold < target_temp < max_temp_threshold";

/// One day.
pub const MAX_DOOR_OPEN_ALERT_SECONDS: i64 = 86_400;
/// One hundred years.
pub const MAX_MAINTENANCE_INTERVAL_DAYS: i64 = 36_500;

/// Partial settings update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SettingsUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_temp: Option<f64>,
    pub min_temp_threshold: Option<f64>,
    pub max_temp_threshold: Option<f64>,
    pub door_open_alert_seconds: Option<i64>,
    pub maintenance_interval_days: Option<i64>,
    pub sensor_pin: Option<i64>,
    pub door_sensor_pin: Option<i64>,
    pub relay_pin: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct SettingsOutcome {
    pub fridge: Fridge,
    pub warnings: Vec<String>,
}

impl SettingsUpdate {
    /// Merge onto `current`, rejecting values no fridge can have.
    fn apply(self, current: &Fridge) -> Result<Fridge, MonitorError> {
        let invalid = |msg: String| Err(MonitorError::InvalidSettings(msg));
        let mut next = current.clone();

        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return invalid("name must not be empty".into());
            }
            next.name = name;
        }
        if let Some(description) = self.description {
            next.description = Some(description);
        }

        for (field, value, slot) in [
            ("target_temp", self.target_temp, &mut next.target_temp),
            ("min_temp_threshold", self.min_temp_threshold, &mut next.min_temp_threshold),
            ("max_temp_threshold", self.max_temp_threshold, &mut next.max_temp_threshold),
        ] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return invalid(format!("{field} must be a finite number"));
                }
                *slot = v;
            }
        }

        for (field, value, max, slot) in [
            (
                "door_open_alert_seconds",
                self.door_open_alert_seconds,
                MAX_DOOR_OPEN_ALERT_SECONDS,
                &mut next.door_open_alert_seconds,
            ),
            (
                "maintenance_interval_days",
                self.maintenance_interval_days,
                MAX_MAINTENANCE_INTERVAL_DAYS,
                &mut next.maintenance_interval_days,
            ),
        ] {
            if let Some(v) = value {
                if !(0..=max).contains(&v) {
                    return invalid(format!("{field} must be between 0 and {max}, got {v}"));
                }
                *slot = v;
            }
        }

        for (field, value, slot) in [
            ("sensor_pin", self.sensor_pin, &mut next.sensor_pin),
            ("door_sensor_pin", self.door_sensor_pin, &mut next.door_sensor_pin),
            ("relay_pin", self.relay_pin, &mut next.relay_pin),
        ] {
            if let Some(v) = value {
                if u8::try_from(v).is_err() {
                    return invalid(format!("{field} must be between 0 and 255, got {v}"));
                }
                *slot = v;
            }
        }

        Ok(next)
    }
}

fn pins_changed(before: &Fridge, after: &Fridge) -> bool {
    before.sensor_pin != after.sensor_pin
        || before.door_sensor_pin != after.door_sensor_pin
        || before.relay_pin != after.relay_pin
}

impl MonitorContext {
    /// Apply `update` to the fridge's stored settings.
    ///
    /// Pin changes are saved but only take effect after a restart; thresholds
    /// out of order are saved too. Both produce a warning in the outcome.
    pub async fn update_settings(
        &self,
        fridge_id: i64,
        update: SettingsUpdate,
    ) -> Result<SettingsOutcome, MonitorError> {
        let _guard = self.lock().await;
        let current = fridges::find(self.pool(), fridge_id)
            .await?
            .ok_or(MonitorError::FridgeNotFound(fridge_id))?;

        let next = update.apply(&current)?;
        let fridge = fridges::update_settings(self.pool(), &next).await?;

        let mut warnings = Vec::new();
        if pins_changed(&current, &fridge) {
            warn!(fridge_id, "Pin assignment changed; restart required");
            warnings.push(RESTART_WARNING.to_string());
        }
        if !fridge.thresholds_consistent() {
            warn!(
                fridge_id,
                min = fridge.min_temp_threshold,
                target = fridge.target_temp,
                max = fridge.max_temp_threshold,
                "Saved thresholds out of order"
            );
            warnings.push(THRESHOLD_WARNING.to_string());
        }

        info!(fridge_id, name = %fridge.name, "Fridge settings updated");
        Ok(SettingsOutcome { fridge, warnings })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use sqlx::SqlitePool;

    use super::*;
    use crate::{db::models::NewFridge, hardware::SimulatedHardware};

    async fn setup(pool: SqlitePool) -> (MonitorContext, Fridge) {
        let fridge = fridges::insert(
            &pool,
            &NewFridge {
                name: "Main Refrigerator".into(),
                ..NewFridge::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
        (
            MonitorContext::new(pool, Arc::new(SimulatedHardware::steady())),
            fridge,
        )
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn partial_update_keeps_other_fields(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        let outcome = ctx
            .update_settings(
                fridge.id,
                SettingsUpdate {
                    target_temp: Some(5.0),
                    door_open_alert_seconds: Some(120),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();

        assert!(outcome.warnings.is_empty());
        assert_eq!(outcome.fridge.target_temp, 5.0);
        assert_eq!(outcome.fridge.door_open_alert_seconds, 120);
        assert_eq!(outcome.fridge.name, "Main Refrigerator");
        assert_eq!(outcome.fridge.max_temp_threshold, 8.0);

        let stored = fridges::find(ctx.pool(), fridge.id).await.unwrap().unwrap();
        assert_eq!(stored.target_temp, 5.0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn changing_a_pin_warns_about_restart(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        let outcome = ctx
            .update_settings(
                fridge.id,
                SettingsUpdate {
                    relay_pin: Some(25),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.fridge.relay_pin, 25);
        assert_eq!(outcome.warnings, vec![RESTART_WARNING.to_string()]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn resubmitting_the_same_pin_is_silent(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        let outcome = ctx
            .update_settings(
                fridge.id,
                SettingsUpdate {
                    sensor_pin: Some(fridge.sensor_pin),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.warnings.is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn inverted_thresholds_are_saved_with_warning(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        let outcome = ctx
            .update_settings(
                fridge.id,
                SettingsUpdate {
                    min_temp_threshold: Some(6.0),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.fridge.min_temp_threshold, 6.0);
        assert_eq!(outcome.warnings, vec![THRESHOLD_WARNING.to_string()]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn invalid_values_are_rejected_and_nothing_saved(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        for update in [
            SettingsUpdate {
                door_open_alert_seconds: Some(-1),
                ..SettingsUpdate::default()
            },
            SettingsUpdate {
                maintenance_interval_days: Some(-30),
                ..SettingsUpdate::default()
            },
            SettingsUpdate {
                door_sensor_pin: Some(256),
                target_temp: Some(1.0),
                ..SettingsUpdate::default()
            },
            SettingsUpdate {
                name: Some("  ".into()),
                ..SettingsUpdate::default()
            },
        ] {
            let err = ctx.update_settings(fridge.id, update).await.unwrap_err();
            assert!(matches!(err, MonitorError::InvalidSettings(_)));
        }

        let stored = fridges::find(ctx.pool(), fridge.id).await.unwrap().unwrap();
        assert_eq!(stored.target_temp, 4.0);
        assert_eq!(stored.door_sensor_pin, 17);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn oversized_durations_are_rejected(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        for update in [
            SettingsUpdate {
                door_open_alert_seconds: Some(i64::MAX / 2),
                ..SettingsUpdate::default()
            },
            SettingsUpdate {
                door_open_alert_seconds: Some(MAX_DOOR_OPEN_ALERT_SECONDS + 1),
                ..SettingsUpdate::default()
            },
            SettingsUpdate {
                maintenance_interval_days: Some((i64::from(i32::MAX) - 2000) * 365),
                ..SettingsUpdate::default()
            },
        ] {
            let err = ctx.update_settings(fridge.id, update).await.unwrap_err();
            assert!(matches!(err, MonitorError::InvalidSettings(_)));
        }

        let outcome = ctx
            .update_settings(
                fridge.id,
                SettingsUpdate {
                    door_open_alert_seconds: Some(MAX_DOOR_OPEN_ALERT_SECONDS),
                    maintenance_interval_days: Some(MAX_MAINTENANCE_INTERVAL_DAYS),
                    ..SettingsUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.fridge.door_open_alert_seconds, MAX_DOOR_OPEN_ALERT_SECONDS);
        assert_eq!(outcome.fridge.maintenance_interval_days, MAX_MAINTENANCE_INTERVAL_DAYS);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_fridge_is_not_found(pool: SqlitePool) {
        let (ctx, fridge) = setup(pool).await;
        let err = ctx
            .update_settings(fridge.id + 1, SettingsUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MonitorError::FridgeNotFound(_)));
    }
}
