use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use tokio::time;
use tracing::{error, info};

use super::{MonitorContext, MonitorError};
use crate::db::{alerts, door_events, readings};

/// How long each kind of history is kept, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub readings_days: i64,
    pub door_events_days: i64,
    /// Applies to acknowledged alerts only.
    pub alerts_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            readings_days: 30,
            door_events_days: 60,
            alerts_days: 90,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub readings: u64,
    pub door_events: u64,
    pub alerts: u64,
}

/// Runs [`MonitorContext::cleanup_old_data`] once a day at a fixed UTC hour.
pub struct CleanupService {
    ctx: MonitorContext,
    policy: RetentionPolicy,
    hour_utc: u32,
}

impl CleanupService {
    pub fn new(ctx: MonitorContext, policy: RetentionPolicy, hour_utc: u32) -> Self {
        Self {
            ctx,
            policy,
            hour_utc,
        }
    }

    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(hour_utc = self.hour_utc, policy = ?self.policy, "Daily cleanup scheduled");
        loop {
            time::sleep(until_next_run(Utc::now(), self.hour_utc)).await;
            if let Err(e) = self.ctx.cleanup_old_data(self.policy, Utc::now()).await {
                error!(error = %e, "Error during data cleanup");
            }
        }
    }
}

/// Time from `now` until the next `hour_utc:00`, strictly in the future.
pub fn until_next_run(now: DateTime<Utc>, hour_utc: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour_utc.min(23), 0, 0).unwrap_or_default();
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += TimeDelta::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

impl MonitorContext {
    /// Delete history older than the policy allows.
    ///
    /// Unacknowledged alerts are never deleted, whatever their age.
    pub async fn cleanup_old_data(
        &self,
        policy: RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, MonitorError> {
        let _guard = self.lock().await;
        let mut tx = self.pool().begin().await?;

        let report = CleanupReport {
            readings: readings::delete_older_than(&mut *tx, now - TimeDelta::days(policy.readings_days))
                .await?,
            door_events: door_events::delete_older_than(
                &mut *tx,
                now - TimeDelta::days(policy.door_events_days),
            )
            .await?,
            alerts: alerts::delete_acknowledged_older_than(
                &mut *tx,
                now - TimeDelta::days(policy.alerts_days),
            )
            .await?,
        };
        tx.commit().await?;

        info!(
            readings = report.readings,
            door_events = report.door_events,
            alerts = report.alerts,
            "Cleanup complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use sqlx::SqlitePool;

    use super::*;
    use crate::{
        db::{
            fridges,
            models::{AlertType, DoorEventType, NewFridge},
        },
        hardware::SimulatedHardware,
        monitor::alerts::emit,
    };

    #[test]
    fn next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 5, 10, 1, 30, 0).unwrap();
        assert_eq!(until_next_run(now, 2), Duration::from_secs(30 * 60));
    }

    #[test]
    fn next_run_tomorrow_once_hour_has_passed() {
        let now = Utc.with_ymd_and_hms(2025, 5, 10, 2, 0, 0).unwrap();
        assert_eq!(until_next_run(now, 2), Duration::from_secs(24 * 3600));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cleanup_prunes_by_age_and_keeps_unacknowledged_alerts(pool: SqlitePool) {
        let now = Utc::now();
        let f = fridges::insert(&pool, &NewFridge::default(), now).await.unwrap();

        let old = now - TimeDelta::days(120);
        readings::insert(&pool, f.id, 4.0, 50.0, old).await.unwrap();
        readings::insert(&pool, f.id, 4.0, 50.0, now - TimeDelta::days(29)).await.unwrap();
        door_events::insert(&pool, f.id, DoorEventType::Open, now - TimeDelta::days(61))
            .await
            .unwrap();
        door_events::insert(&pool, f.id, DoorEventType::Close, now - TimeDelta::days(59))
            .await
            .unwrap();

        let stale_ack = emit(&pool, f.id, AlertType::TempHigh, "old", old).await.unwrap();
        alerts::acknowledge(&pool, stale_ack.id).await.unwrap();
        let recent_ack = emit(&pool, f.id, AlertType::TempLow, "recent", now).await.unwrap();
        alerts::acknowledge(&pool, recent_ack.id).await.unwrap();
        let stale_open = emit(&pool, f.id, AlertType::DoorOpen, "ancient", old).await.unwrap();

        let ctx = MonitorContext::new(pool.clone(), Arc::new(SimulatedHardware::steady()));
        let report = ctx
            .cleanup_old_data(RetentionPolicy::default(), now)
            .await
            .unwrap();

        assert_eq!(
            report,
            CleanupReport {
                readings: 1,
                door_events: 1,
                alerts: 1,
            }
        );
        assert!(alerts::find(&pool, stale_open.id).await.unwrap().is_some());
        assert!(alerts::find(&pool, recent_ack.id).await.unwrap().is_some());
        assert!(alerts::find(&pool, stale_ack.id).await.unwrap().is_none());
    }
}
