use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Mirrors the `alert_type` column (stored as snake_case TEXT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DoorOpen,
    TempHigh,
    TempLow,
    MaintenanceDue,
    Defrosting,
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertType::DoorOpen => "door_open",
            AlertType::TempHigh => "temp_high",
            AlertType::TempLow => "temp_low",
            AlertType::MaintenanceDue => "maintenance_due",
            AlertType::Defrosting => "defrosting",
        };
        f.write_str(s)
    }
}

/// Mirrors the `event_type` column of `door_events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DoorEventType {
    Open,
    Close,
}

impl DoorEventType {
    pub fn from_open(is_open: bool) -> Self {
        if is_open {
            Self::Open
        } else {
            Self::Close
        }
    }
}

impl fmt::Display for DoorEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DoorEventType::Open => "open",
            DoorEventType::Close => "close",
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Fridge {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    /// Degrees Celsius
    pub target_temp: f64,
    pub min_temp_threshold: f64,
    pub max_temp_threshold: f64,
    pub door_open_alert_seconds: i64,
    pub compressor_status: bool,
    pub maintenance_interval_days: i64,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// DHT22 data pin (BCM numbering)
    pub sensor_pin: i64,
    pub door_sensor_pin: i64,
    pub relay_pin: i64,
}

impl Fridge {
    /// Whole days until the next maintenance is due, floored at zero.
    ///
    /// The interval is applied as whole years (`maintenance_interval_days / 365`)
    /// on the calendar date of the last maintenance, so any interval under a
    /// year makes maintenance due immediately. A due date past the end of the
    /// representable calendar is never reached and yields `i64::MAX`.
    pub fn days_until_maintenance(&self, now: DateTime<Utc>) -> i64 {
        let Some(last) = self.last_maintenance_date else {
            return 0;
        };

        let year = i32::try_from(self.maintenance_interval_days / 365)
            .ok()
            .and_then(|years| last.year().checked_add(years));
        // Feb 29 has no counterpart in non-leap years.
        let next = year.and_then(|year| {
            last.with_year(year)
                .or_else(|| last.with_day(28).and_then(|d| d.with_year(year)))
        });

        match next {
            Some(next) => (next - now).num_days().max(0),
            None => i64::MAX,
        }
    }

    pub fn thresholds_consistent(&self) -> bool {
        self.min_temp_threshold < self.target_temp && self.target_temp < self.max_temp_threshold
    }
}

/// Row to insert into `fridges`; ids and timestamps are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewFridge {
    pub name: String,
    pub description: Option<String>,
    pub target_temp: f64,
    pub min_temp_threshold: f64,
    pub max_temp_threshold: f64,
    pub door_open_alert_seconds: i64,
    pub maintenance_interval_days: i64,
    pub last_maintenance_date: Option<DateTime<Utc>>,
    pub sensor_pin: i64,
    pub door_sensor_pin: i64,
    pub relay_pin: i64,
}

impl Default for NewFridge {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            target_temp: 4.0,
            min_temp_threshold: 2.0,
            max_temp_threshold: 8.0,
            door_open_alert_seconds: 60,
            maintenance_interval_days: 365,
            last_maintenance_date: None,
            sensor_pin: 4,
            door_sensor_pin: 17,
            relay_pin: 18,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub id: i64,
    pub fridge_id: i64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DoorEvent {
    pub id: i64,
    pub fridge_id: i64,
    pub event_type: DoorEventType,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub fridge_id: i64,
    pub alert_type: AlertType,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: i64,
    pub fridge_id: i64,
    pub maintenance_date: DateTime<Utc>,
    pub description: String,
    pub performed_by: String,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn fridge(last: Option<DateTime<Utc>>, interval_days: i64) -> Fridge {
        Fridge {
            id: 1,
            name: "Main".into(),
            description: None,
            target_temp: 4.0,
            min_temp_threshold: 2.0,
            max_temp_threshold: 8.0,
            door_open_alert_seconds: 60,
            compressor_status: false,
            maintenance_interval_days: interval_days,
            last_maintenance_date: last,
            created_at: Utc::now(),
            sensor_pin: 4,
            door_sensor_pin: 17,
            relay_pin: 18,
        }
    }

    #[test]
    fn maintenance_overdue_after_400_days() {
        let now = Utc::now();
        let f = fridge(Some(now - Duration::days(400)), 365);
        assert_eq!(f.days_until_maintenance(now), 0);
    }

    #[test]
    fn maintenance_counts_down_within_the_year() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let f = fridge(Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()), 365);
        // 2025-06-01 minus 2025-03-01 = 92 days
        assert_eq!(f.days_until_maintenance(now), 92);
    }

    #[test]
    fn maintenance_due_immediately_when_interval_under_a_year() {
        let now = Utc::now();
        let f = fridge(Some(now - Duration::days(1)), 180);
        assert_eq!(f.days_until_maintenance(now), 0);
    }

    #[test]
    fn maintenance_due_without_a_recorded_date() {
        assert_eq!(fridge(None, 365).days_until_maintenance(Utc::now()), 0);
    }

    #[test]
    fn maintenance_from_leap_day_falls_back_to_feb_28() {
        let last = Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 2, 18, 0, 0, 0).unwrap();
        assert_eq!(fridge(Some(last), 365).days_until_maintenance(now), 10);
    }

    #[test]
    fn maintenance_beyond_the_calendar_is_never_due() {
        let now = Utc::now();
        for interval in [(i64::from(i32::MAX) - 2000) * 365, i64::MAX, 365 * 400_000] {
            let f = fridge(Some(now - Duration::days(400)), interval);
            assert_eq!(f.days_until_maintenance(now), i64::MAX);
        }
    }

    #[test]
    fn thresholds_consistency_is_reported_not_enforced() {
        let mut f = fridge(None, 365);
        assert!(f.thresholds_consistent());
        f.min_temp_threshold = 5.0;
        assert!(!f.thresholds_consistent());
    }

    #[test]
    fn alert_type_display_matches_column_values() {
        assert_eq!(AlertType::DoorOpen.to_string(), "door_open");
        assert_eq!(AlertType::MaintenanceDue.to_string(), "maintenance_due");
        assert_eq!(DoorEventType::from_open(false).to_string(), "close");
    }
}
