use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::SqliteConnection;
use tokio::{task, time};
use tracing::{debug, error, info, warn};

use super::{alerts::emit_unless_active, DoorTimers, MonitorContext, MonitorError};
use crate::{
    db::{
        fridges,
        models::{AlertType, Fridge},
        readings,
    },
    hardware::{pin, ClimateReading},
};

/// Readings compared by the defrost heuristic, current one included.
pub const DEFROST_WINDOW: i64 = 5;
/// Rise over the window that counts as an uncontrolled defrost, in °C.
pub const DEFROST_RISE: f64 = 3.0;

const ALARM_BUZZ: Duration = Duration::from_millis(500);
const DOOR_BUZZ: Duration = Duration::from_secs(1);

/// What a single fleet check did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CheckReport {
    pub fridges: usize,
    pub readings: usize,
    pub sensor_failures: usize,
    pub relay_switches: usize,
    pub alerts: Vec<(i64, AlertType)>,
}

pub struct CheckService {
    ctx: MonitorContext,
    interval: Duration,
}

impl CheckService {
    pub fn new(ctx: MonitorContext, interval_secs: u64) -> Self {
        Self {
            ctx,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Runs the check loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Fridge check loop started");
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            match self.ctx.check_fridges(Utc::now()).await {
                Ok(report) => debug!(?report, "Fridge check complete"),
                Err(e) => error!(error = %e, "Fridge check failed; cycle rolled back"),
            }
        }
    }
}

impl MonitorContext {
    /// Check every fridge once.
    ///
    /// Sensors are sampled first, then all writes for the cycle go through a
    /// single transaction: any database error rolls back every fridge.
    pub async fn check_fridges(&self, now: DateTime<Utc>) -> Result<CheckReport, MonitorError> {
        let timers = self.lock().await;
        let fleet = fridges::list(self.pool()).await?;

        let mut samples = Vec::with_capacity(fleet.len());
        for fridge in &fleet {
            samples.push(self.sample(fridge).await);
        }

        let mut report = CheckReport {
            fridges: fleet.len(),
            ..CheckReport::default()
        };
        let mut tx = self.pool().begin().await?;
        for (fridge, sample) in fleet.iter().zip(samples) {
            self.check_fridge(&mut tx, fridge, sample, &timers, now, &mut report)
                .await?;
        }
        tx.commit().await?;

        Ok(report)
    }

    /// Read the fridge's climate sensor off the async runtime.
    /// Failures are logged and yield `None`.
    async fn sample(&self, fridge: &Fridge) -> Option<ClimateReading> {
        let sensor_pin = match pin(fridge.sensor_pin) {
            Ok(p) => p,
            Err(e) => {
                warn!(fridge_id = fridge.id, error = %e, "Bad sensor pin");
                return None;
            }
        };

        let hardware = self.hardware().clone();
        match task::spawn_blocking(move || hardware.read_climate(sensor_pin)).await {
            Ok(Ok(reading)) => Some(reading),
            Ok(Err(e)) => {
                warn!(fridge_id = fridge.id, error = %e, "Sensor read failed; skipping reading checks");
                None
            }
            Err(e) => {
                warn!(fridge_id = fridge.id, error = %e, "Sensor read task failed");
                None
            }
        }
    }

    async fn check_fridge(
        &self,
        conn: &mut SqliteConnection,
        fridge: &Fridge,
        sample: Option<ClimateReading>,
        timers: &DoorTimers,
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), MonitorError> {
        match sample {
            Some(climate) => self.check_climate(conn, fridge, climate, now, report).await?,
            None => report.sensor_failures += 1,
        }

        if let Some(opened_at) = timers.open_since(fridge.id) {
            let open_for = now - opened_at;
            // A limit too large for a TimeDelta never expires.
            let expired = TimeDelta::try_seconds(fridge.door_open_alert_seconds)
                .is_some_and(|limit| open_for > limit);
            if expired {
                let message = format!("Door has been open for {} seconds", open_for.num_seconds());
                if emit_unless_active(conn, fridge.id, AlertType::DoorOpen, &message, now)
                    .await?
                    .is_some()
                {
                    report.alerts.push((fridge.id, AlertType::DoorOpen));
                    self.hardware().sound_buzzer(DOOR_BUZZ);
                }
            }
        }

        if fridge.days_until_maintenance(now) <= 0
            && emit_unless_active(
                conn,
                fridge.id,
                AlertType::MaintenanceDue,
                "Annual maintenance is due",
                now,
            )
            .await?
            .is_some()
        {
            report.alerts.push((fridge.id, AlertType::MaintenanceDue));
        }

        Ok(())
    }

    async fn check_climate(
        &self,
        conn: &mut SqliteConnection,
        fridge: &Fridge,
        climate: ClimateReading,
        now: DateTime<Utc>,
        report: &mut CheckReport,
    ) -> Result<(), MonitorError> {
        let temperature = climate.temperature;
        readings::insert(&mut *conn, fridge.id, temperature, climate.humidity, now).await?;
        report.readings += 1;

        if let Some((alert_type, message)) = threshold_breach(fridge, temperature) {
            if emit_unless_active(conn, fridge.id, alert_type, &message, now)
                .await?
                .is_some()
            {
                report.alerts.push((fridge.id, alert_type));
            }
            self.hardware().sound_buzzer(ALARM_BUZZ);
        }

        let should_run = compressor_should_run(fridge, temperature);
        if should_run != fridge.compressor_status {
            fridges::set_compressor_status(&mut *conn, fridge.id, should_run).await?;
            report.relay_switches += 1;
            let relay = pin(fridge.relay_pin).and_then(|p| self.hardware().set_relay(p, should_run));
            match relay {
                Ok(()) => info!(fridge_id = fridge.id, running = should_run, "Compressor switched"),
                Err(e) => error!(fridge_id = fridge.id, error = %e, "Failed to drive compressor relay"),
            }
        }

        let window: Vec<f64> = readings::recent(&mut *conn, fridge.id, DEFROST_WINDOW)
            .await?
            .iter()
            .map(|r| r.temperature)
            .collect();
        if is_defrosting(temperature, &window) {
            if emit_unless_active(
                conn,
                fridge.id,
                AlertType::Defrosting,
                "Rapid temperature increase detected, possible defrosting",
                now,
            )
            .await?
            .is_some()
            {
                report.alerts.push((fridge.id, AlertType::Defrosting));
            }
            self.hardware().sound_buzzer(ALARM_BUZZ);
        }

        Ok(())
    }
}

/// High is checked first, so at most one of the two fires.
pub fn threshold_breach(fridge: &Fridge, temperature: f64) -> Option<(AlertType, String)> {
    if temperature > fridge.max_temp_threshold {
        Some((
            AlertType::TempHigh,
            format!("Temperature too high: {temperature:.1}°C"),
        ))
    } else if temperature < fridge.min_temp_threshold {
        Some((
            AlertType::TempLow,
            format!("Temperature too low: {temperature:.1}°C"),
        ))
    } else {
        None
    }
}

/// Bang-bang control with no deadband.
pub fn compressor_should_run(fridge: &Fridge, temperature: f64) -> bool {
    temperature > fridge.target_temp
}

/// `window` holds the latest readings newest first; its last entry is the
/// oldest. Needs a full window to decide.
pub fn is_defrosting(current: f64, window: &[f64]) -> bool {
    if window.len() < DEFROST_WINDOW as usize {
        return false;
    }
    window
        .last()
        .is_some_and(|oldest| current > oldest + DEFROST_RISE)
}
