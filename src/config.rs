use std::str::FromStr;

use anyhow::{Context, Result};

use crate::monitor::retention::RetentionPolicy;

// ---------------------------------------------------------------------------
// HardwareMode
// ---------------------------------------------------------------------------

/// Which driver backs the sensors, relays and buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareMode {
    Simulated,
    Gpio,
}

impl FromStr for HardwareMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simulated" | "simulation" => Ok(Self::Simulated),
            "gpio" => Ok(Self::Gpio),
            other => Err(anyhow::anyhow!("unknown hardware mode: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub hardware_mode: HardwareMode,
    /// BCM pin driving the alarm buzzer.
    pub buzzer_pin: u8,
    /// Seconds between fleet checks.
    pub check_interval_secs: u64,
    /// UTC hour (0-23) at which the daily cleanup runs.
    pub cleanup_hour_utc: u32,
    pub retention: RetentionPolicy,
    /// Create the two default fridges when the database has none.
    pub seed_default_fridges: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let cleanup_hour_utc: u32 = optional("CLEANUP_HOUR_UTC", "2")
            .parse()
            .context("CLEANUP_HOUR_UTC must be an hour between 0 and 23")?;
        anyhow::ensure!(
            cleanup_hour_utc < 24,
            "CLEANUP_HOUR_UTC must be an hour between 0 and 23, got {cleanup_hour_utc}"
        );

        let check_interval_secs: u64 = optional("CHECK_INTERVAL_SECS", "30")
            .parse()
            .context("CHECK_INTERVAL_SECS must be a positive integer")?;
        anyhow::ensure!(check_interval_secs > 0, "CHECK_INTERVAL_SECS must be positive");

        Ok(Self {
            database_url: optional("DATABASE_URL", "sqlite://fridge_monitor.db"),
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            hardware_mode: optional("HARDWARE_MODE", "simulated")
                .parse()
                .context("HARDWARE_MODE must be 'simulated' or 'gpio'")?,
            buzzer_pin: optional("BUZZER_PIN", "27")
                .parse()
                .context("BUZZER_PIN must be a GPIO pin number")?,
            check_interval_secs,
            cleanup_hour_utc,
            retention: RetentionPolicy {
                readings_days: days("TEMP_DATA_RETENTION_DAYS", "30")?,
                door_events_days: days("DOOR_EVENT_RETENTION_DAYS", "60")?,
                alerts_days: days("ALERT_RETENTION_DAYS", "90")?,
            },
            seed_default_fridges: parse_bool(&optional("SEED_DEFAULT_FRIDGES", "true"))
                .context("SEED_DEFAULT_FRIDGES must be true or false")?,
        })
    }
}

fn days(key: &str, default: &str) -> Result<i64> {
    let value: i64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} must be a whole number of days"))?;
    anyhow::ensure!(value > 0, "{key} must be positive, got {value}");
    Ok(value)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "yes" => Ok(true),
        "false" | "0" | "f" | "no" => Ok(false),
        other => Err(anyhow::anyhow!("not a boolean: {other:?}")),
    }
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
