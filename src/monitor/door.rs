use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{MonitorContext, MonitorError};
use crate::{
    db::{
        alerts, door_events, fridges,
        models::{AlertType, DoorEventType},
    },
    hardware::DoorTransition,
};

/// Consumes door transitions pushed by the hardware layer.
pub struct DoorListener {
    ctx: MonitorContext,
    events: mpsc::Receiver<DoorTransition>,
}

impl DoorListener {
    pub fn new(ctx: MonitorContext, events: mpsc::Receiver<DoorTransition>) -> Self {
        Self { ctx, events }
    }

    /// Handles transitions until every sender is dropped.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(mut self) {
        info!("Door listener started");
        while let Some(transition) = self.events.recv().await {
            if let Err(e) = self.ctx.handle_door_transition(transition, Utc::now()).await {
                error!(
                    fridge_id = transition.fridge_id,
                    pin = transition.pin,
                    error = %e,
                    "Error handling door transition"
                );
            }
        }
        info!("Door event channel closed; listener stopped");
    }
}

impl MonitorContext {
    /// Record the door's current state for the fridge behind `transition`.
    ///
    /// Opening starts the in-memory open timer; closing stops it and
    /// acknowledges outstanding door-open alerts. The timer map is only
    /// touched once the event is committed.
    pub async fn handle_door_transition(
        &self,
        transition: DoorTransition,
        now: DateTime<Utc>,
    ) -> Result<DoorEventType, MonitorError> {
        let is_open = self.hardware().read_door(transition.pin)?;

        let mut timers = self.lock().await;
        let fridge = fridges::find(self.pool(), transition.fridge_id)
            .await?
            .ok_or(MonitorError::FridgeNotFound(transition.fridge_id))?;

        let event_type = DoorEventType::from_open(is_open);
        debug!(fridge_id = fridge.id, name = %fridge.name, door = %event_type, "Door sensor triggered");

        let mut tx = self.pool().begin().await?;
        door_events::insert(&mut *tx, fridge.id, event_type, now).await?;
        let cleared = match event_type {
            DoorEventType::Open => 0,
            DoorEventType::Close => {
                alerts::acknowledge_active(&mut *tx, fridge.id, AlertType::DoorOpen).await?
            }
        };
        tx.commit().await?;

        match event_type {
            DoorEventType::Open => timers.opened(fridge.id, now),
            DoorEventType::Close => timers.closed(fridge.id),
        }
        if cleared > 0 {
            info!(fridge_id = fridge.id, cleared, "Door closed; door-open alerts acknowledged");
        }

        Ok(event_type)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use sqlx::SqlitePool;

    use super::*;
    use crate::{
        db::{models::Fridge, models::NewFridge},
        hardware::{Hardware, SimulatedHardware},
        monitor::alerts::emit,
    };

    async fn setup(pool: SqlitePool) -> (SqlitePool, Arc<SimulatedHardware>, MonitorContext, Fridge, mpsc::Receiver<DoorTransition>) {
        let fridge = fridges::insert(
            &pool,
            &NewFridge {
                name: "Main Refrigerator".into(),
                last_maintenance_date: Some(Utc::now()),
                ..NewFridge::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();
        let hw = Arc::new(SimulatedHardware::steady());
        let (tx, rx) = mpsc::channel(8);
        hw.attach_fridge(&fridge, tx).unwrap();
        let ctx = MonitorContext::new(pool.clone(), hw.clone());
        (pool, hw, ctx, fridge, rx)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn open_records_event_and_starts_timer(pool: SqlitePool) {
        let (pool, hw, ctx, fridge, mut rx) = setup(pool).await;
        hw.set_door(17, true);
        let transition = rx.recv().await.unwrap();

        let t0 = Utc::now();
        let event = ctx.handle_door_transition(transition, t0).await.unwrap();
        assert_eq!(event, DoorEventType::Open);
        assert_eq!(ctx.lock().await.open_since(fridge.id), Some(t0));

        let latest = door_events::latest(&pool, fridge.id, None).await.unwrap().unwrap();
        assert_eq!(latest.event_type, DoorEventType::Open);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn close_clears_timer_and_acknowledges_door_alerts(pool: SqlitePool) {
        let (pool, hw, ctx, fridge, mut rx) = setup(pool).await;
        let t0 = Utc::now();

        hw.set_door(17, true);
        ctx.handle_door_transition(rx.recv().await.unwrap(), t0).await.unwrap();
        emit(&pool, fridge.id, AlertType::DoorOpen, "open too long", t0).await.unwrap();
        emit(&pool, fridge.id, AlertType::TempHigh, "hot", t0).await.unwrap();

        hw.set_door(17, false);
        let event = ctx
            .handle_door_transition(rx.recv().await.unwrap(), t0 + Duration::seconds(90))
            .await
            .unwrap();
        assert_eq!(event, DoorEventType::Close);
        assert!(ctx.lock().await.open_since(fridge.id).is_none());

        let active = alerts::active_for_fridge(&pool, fridge.id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_type, AlertType::TempHigh);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unknown_fridge_is_reported_and_nothing_recorded(pool: SqlitePool) {
        let (pool, _hw, ctx, fridge, _rx) = setup(pool).await;
        let transition = DoorTransition {
            fridge_id: fridge.id + 100,
            pin: 17,
        };

        let err = ctx.handle_door_transition(transition, Utc::now()).await.unwrap_err();
        assert!(matches!(err, MonitorError::FridgeNotFound(id) if id == fridge.id + 100));
        assert!(door_events::latest(&pool, fridge.id, None).await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn unreadable_door_pin_is_an_error(pool: SqlitePool) {
        let (_pool, _hw, ctx, fridge, _rx) = setup(pool).await;
        let transition = DoorTransition {
            fridge_id: fridge.id,
            pin: 99,
        };
        let err = ctx.handle_door_transition(transition, Utc::now()).await.unwrap_err();
        assert!(matches!(err, MonitorError::Hardware(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn door_open_then_check_then_close_resolves_alert(pool: SqlitePool) {
        let (pool, hw, ctx, fridge, mut rx) = setup(pool).await;
        let t0 = Utc::now();

        hw.set_door(17, true);
        ctx.handle_door_transition(rx.recv().await.unwrap(), t0).await.unwrap();
        let report = ctx.check_fridges(t0 + Duration::seconds(90)).await.unwrap();
        assert_eq!(report.alerts, vec![(fridge.id, AlertType::DoorOpen)]);

        hw.set_door(17, false);
        ctx.handle_door_transition(rx.recv().await.unwrap(), t0 + Duration::seconds(100))
            .await
            .unwrap();
        assert!(alerts::find_active(&pool, fridge.id, AlertType::DoorOpen)
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn restart_while_open_loses_the_timer(pool: SqlitePool) {
        let (pool, hw, ctx, fridge, mut rx) = setup(pool).await;
        let t0 = Utc::now();
        hw.set_door(17, true);
        ctx.handle_door_transition(rx.recv().await.unwrap(), t0).await.unwrap();

        // A fresh context stands in for a restarted process.
        let restarted = MonitorContext::new(pool.clone(), hw.clone());
        let report = restarted
            .check_fridges(t0 + Duration::seconds(600))
            .await
            .unwrap();

        assert!(report.alerts.is_empty());
        let latest = door_events::latest(&pool, fridge.id, None).await.unwrap().unwrap();
        assert_eq!(latest.event_type, DoorEventType::Open);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn listener_drains_channel_until_closed(pool: SqlitePool) {
        let (pool, _hw, ctx, fridge, _rx) = setup(pool).await;
        let (tx, rx) = mpsc::channel(4);
        tx.send(DoorTransition { fridge_id: fridge.id, pin: 17 }).await.unwrap();
        drop(tx);

        DoorListener::new(ctx, rx).run().await;

        let latest = door_events::latest(&pool, fridge.id, None).await.unwrap().unwrap();
        assert_eq!(latest.event_type, DoorEventType::Close);
    }
}
