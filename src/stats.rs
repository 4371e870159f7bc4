//! Read-only summaries over stored readings and door events.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::db::{
    door_events,
    models::{DoorEventType, Fridge, TemperatureReading},
    readings,
};

/// Format used for every timestamp handed to chart consumers.
pub const CHART_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Today's figures for one fridge. Days are UTC calendar days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DailyStats {
    pub door_open_count: i64,
    /// °C, one decimal
    pub avg_temp: Option<f64>,
    /// %, one decimal
    pub avg_humidity: Option<f64>,
    /// Whole seconds
    pub avg_recovery_time: Option<f64>,
}

/// Readings as parallel arrays, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TemperatureSeries {
    pub timestamps: Vec<String>,
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub async fn current_reading(
    pool: &SqlitePool,
    fridge_id: i64,
) -> sqlx::Result<Option<TemperatureReading>> {
    readings::latest(pool, fridge_id).await
}

/// Derived from the last stored door event; no events means closed.
pub async fn is_door_open(pool: &SqlitePool, fridge_id: i64) -> sqlx::Result<bool> {
    let latest = door_events::latest(pool, fridge_id, None).await?;
    Ok(latest.is_some_and(|e| e.event_type == DoorEventType::Open))
}

/// Seconds from `closed_at` until the first later reading at or below target.
async fn recovery_after(
    pool: &SqlitePool,
    fridge: &Fridge,
    closed_at: DateTime<Utc>,
) -> sqlx::Result<Option<f64>> {
    let recovered =
        readings::first_at_or_below_after(pool, fridge.id, fridge.target_temp, closed_at).await?;
    Ok(recovered.map(|r| seconds(r.recorded_at - closed_at)))
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

/// Recovery time after the most recent door close, in seconds.
pub async fn last_recovery_time(pool: &SqlitePool, fridge: &Fridge) -> sqlx::Result<Option<f64>> {
    match door_events::latest(pool, fridge.id, Some(DoorEventType::Close)).await? {
        Some(close) => recovery_after(pool, fridge, close.recorded_at).await,
        None => Ok(None),
    }
}

pub async fn daily_stats(
    pool: &SqlitePool,
    fridge: &Fridge,
    now: DateTime<Utc>,
) -> sqlx::Result<DailyStats> {
    let start = now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let end = start + TimeDelta::days(1);

    let opens = door_events::between(pool, fridge.id, DoorEventType::Open, start, end).await?;
    let today = readings::between(pool, fridge.id, start, end).await?;

    let mut recoveries = Vec::new();
    for close in door_events::between(pool, fridge.id, DoorEventType::Close, start, end).await? {
        if let Some(secs) = recovery_after(pool, fridge, close.recorded_at).await? {
            recoveries.push(secs);
        }
    }

    Ok(DailyStats {
        door_open_count: opens.len() as i64,
        avg_temp: mean(today.iter().map(|r| r.temperature)).map(round1),
        avg_humidity: mean(today.iter().map(|r| r.humidity)).map(round1),
        avg_recovery_time: mean(recoveries.into_iter()).map(f64::round),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Readings newer than `now - days`, for charting.
///
/// A window reaching outside the representable time range yields an empty series.
pub async fn temperature_series(
    pool: &SqlitePool,
    fridge_id: i64,
    days: i64,
    now: DateTime<Utc>,
) -> sqlx::Result<TemperatureSeries> {
    let Some(since) = TimeDelta::try_days(days).and_then(|d| now.checked_sub_signed(d)) else {
        return Ok(TemperatureSeries::default());
    };
    let rows = readings::since(pool, fridge_id, since).await?;

    let mut series = TemperatureSeries::default();
    for r in rows {
        series
            .timestamps
            .push(r.recorded_at.format(CHART_TIME_FORMAT).to_string());
        series.temperatures.push(round1(r.temperature));
        series.humidities.push(round1(r.humidity));
    }
    Ok(series)
}
