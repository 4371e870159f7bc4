//! Sensor, relay and buzzer drivers.
//!
//! The monitor only talks to [`Hardware`]; which implementation backs it is
//! decided once at startup from `HARDWARE_MODE`.

pub mod dht22;
#[cfg(feature = "gpio")]
pub mod gpio;
pub mod simulator;

use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    config::{Config, HardwareMode},
    db::models::Fridge,
};

pub use simulator::SimulatedHardware;

/// Minimum spacing between two accepted edges on a door contact.
pub const DOOR_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity percentage
    pub humidity: f64,
}

/// Pushed by the hardware layer whenever a door contact changes level.
///
/// Carries no state: the consumer re-reads the pin, so a burst of edges
/// collapses to whatever the door is doing when the event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorTransition {
    pub fridge_id: i64,
    pub pin: u8,
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("no valid reading from sensor on pin {pin}")]
    SensorRead { pin: u8 },

    #[error("DHT22 checksum mismatch: frame says {expected:#04x}, computed {actual:#04x}")]
    Checksum { expected: u8, actual: u8 },

    #[error("DHT22 reading out of range: {temperature} °C, {humidity} %")]
    OutOfRange { temperature: f64, humidity: f64 },

    #[error("timed out waiting for sensor on pin {pin}")]
    Timeout { pin: u8 },

    #[error("pin number {0} is not a valid GPIO pin")]
    InvalidPin(i64),

    #[error("pin {pin} has not been set up")]
    UnconfiguredPin { pin: u8 },

    #[error("GPIO error: {0}")]
    Gpio(String),
}

/// Narrow a stored pin number to the `u8` the drivers use.
pub fn pin(value: i64) -> Result<u8, HardwareError> {
    u8::try_from(value).map_err(|_| HardwareError::InvalidPin(value))
}

/// Driver interface shared by the Raspberry Pi and simulated backends.
///
/// Calls are synchronous and may block (a DHT22 read with retries can take
/// tens of seconds); async callers should go through `spawn_blocking`.
pub trait Hardware: Send + Sync {
    /// Configure the fridge's pins: relay output driven to its stored
    /// compressor state, door input watched for edges pushed to `events`.
    fn attach_fridge(
        &self,
        fridge: &Fridge,
        events: mpsc::Sender<DoorTransition>,
    ) -> Result<(), HardwareError>;

    fn read_climate(&self, pin: u8) -> Result<ClimateReading, HardwareError>;

    /// `true` when the door is open.
    fn read_door(&self, pin: u8) -> Result<bool, HardwareError>;

    fn set_relay(&self, pin: u8, on: bool) -> Result<(), HardwareError>;

    /// Sound the buzzer for `duration` without blocking the caller.
    fn sound_buzzer(&self, duration: Duration);
}

/// Build the driver selected by the configuration.
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn Hardware>> {
    match config.hardware_mode {
        HardwareMode::Simulated => {
            tracing::info!("Running with simulated hardware");
            Ok(Arc::new(SimulatedHardware::new()))
        }
        #[cfg(feature = "gpio")]
        HardwareMode::Gpio => {
            tracing::info!(buzzer_pin = config.buzzer_pin, "Running on Raspberry Pi GPIO");
            Ok(Arc::new(gpio::GpioHardware::new(config.buzzer_pin)?))
        }
        #[cfg(not(feature = "gpio"))]
        HardwareMode::Gpio => anyhow::bail!(
            "HARDWARE_MODE=gpio requires building with `--features gpio`"
        ),
    }
}
