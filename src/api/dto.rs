use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    db::models::{Alert, AlertType, Fridge, MaintenanceRecord, TemperatureReading},
    stats::{round1, DailyStats, TemperatureSeries, CHART_TIME_FORMAT},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FridgeDto {
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

impl From<Fridge> for FridgeDto {
    fn from(f: Fridge) -> Self {
        Self {
            id: f.id,
            name: f.name,
            description: f.description,
            target_temp: f.target_temp,
            min_temp_threshold: f.min_temp_threshold,
            max_temp_threshold: f.max_temp_threshold,
            door_open_alert_seconds: f.door_open_alert_seconds,
            compressor_status: f.compressor_status,
            maintenance_interval_days: f.maintenance_interval_days,
            last_maintenance_date: f.last_maintenance_date,
            created_at: f.created_at,
            sensor_pin: f.sensor_pin,
            door_sensor_pin: f.door_sensor_pin,
            relay_pin: f.relay_pin,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReadingDto {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<TemperatureReading> for ReadingDto {
    fn from(r: TemperatureReading) -> Self {
        Self {
            temperature: r.temperature,
            humidity: r.humidity,
            recorded_at: r.recorded_at,
        }
    }
}

/// Alert as returned by `GET /api/alerts/{id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertDto {
    pub id: i64,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub message: String,
    /// `%Y-%m-%d %H:%M:%S`, UTC
    pub timestamp: String,
    pub acknowledged: bool,
}

impl From<Alert> for AlertDto {
    fn from(a: Alert) -> Self {
        Self {
            id: a.id,
            alert_type: a.alert_type,
            message: a.message,
            timestamp: a.created_at.format(CHART_TIME_FORMAT).to_string(),
            acknowledged: a.acknowledged,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MaintenanceRecordDto {
    pub id: i64,
    pub maintenance_date: DateTime<Utc>,
    pub description: String,
    pub performed_by: String,
}

impl From<MaintenanceRecord> for MaintenanceRecordDto {
    fn from(m: MaintenanceRecord) -> Self {
        Self {
            id: m.id,
            maintenance_date: m.maintenance_date,
            description: m.description,
            performed_by: m.performed_by,
        }
    }
}

/// One entry of `GET /api/fridges`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FridgeOverviewDto {
    pub fridge: FridgeDto,
    pub current_reading: Option<ReadingDto>,
    pub stats: DailyStats,
    pub days_until_maintenance: i64,
    pub active_alerts: Vec<AlertDto>,
    pub door_open: bool,
}

/// Response of `GET /api/fridges/{id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FridgeDetailDto {
    pub fridge: FridgeDto,
    pub current_reading: Option<ReadingDto>,
    pub temperature_data: TemperatureSeries,
    /// Days of history in `temperature_data`
    pub duration: i64,
    pub stats: DailyStats,
    pub days_until_maintenance: i64,
    /// Newest first
    pub maintenance_history: Vec<MaintenanceRecordDto>,
    pub active_alerts: Vec<AlertDto>,
    /// Last 10 alerts, acknowledged or not
    pub recent_alerts: Vec<AlertDto>,
    pub door_open: bool,
    /// Seconds to reach target temperature after the last door close
    pub recovery_time: Option<f64>,
}

/// Response of `GET /api/stats/{id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FridgeStatsDto {
    #[serde(flatten)]
    pub daily: DailyStats,
    /// °C, one decimal
    pub current_temp: Option<f64>,
    /// %, one decimal
    pub current_humidity: Option<f64>,
    pub door_open: bool,
    pub compressor_status: bool,
}

impl FridgeStatsDto {
    pub fn new(daily: DailyStats, current: Option<&TemperatureReading>, door_open: bool, fridge: &Fridge) -> Self {
        Self {
            daily,
            current_temp: current.map(|r| round1(r.temperature)),
            current_humidity: current.map(|r| round1(r.humidity)),
            door_open,
            compressor_status: fridge.compressor_status,
        }
    }
}

/// Response of `PUT /api/fridges/{id}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SettingsResponse {
    pub fridge: FridgeDto,
    pub warnings: Vec<String>,
}

/// Request body for `POST /api/fridges/{id}/maintenance`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MaintenanceRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub performed_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}
