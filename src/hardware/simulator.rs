//! In-process stand-in for the sensors, relays and buzzer.
//!
//! Used whenever the service runs off a Raspberry Pi. Each attached fridge
//! gets a simulated climate that drifts a little on every read, cools while
//! its relay is on and warms while its door is open. [`SimulatedHardware::steady`]
//! turns all of that off so tests can script exact readings.

use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{pin, ClimateReading, DoorTransition, Hardware, HardwareError};
use crate::db::models::Fridge;

const DEFAULT_HUMIDITY: f64 = 45.0;

#[derive(Debug)]
struct SimulatedFridge {
    fridge_id: i64,
    sensor_pin: u8,
    door_pin: u8,
    relay_pin: u8,
    climate: ClimateReading,
    sensor_failing: bool,
    door_open: bool,
    relay_on: bool,
    events: mpsc::Sender<DoorTransition>,
}

#[derive(Debug, Default)]
struct State {
    fridges: Vec<SimulatedFridge>,
    buzzes: Vec<Duration>,
}

#[derive(Debug)]
pub struct SimulatedHardware {
    state: Mutex<State>,
    drift: bool,
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHardware {
    /// Simulation with random drift and relay/door effects.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            drift: true,
        }
    }

    /// Simulation that returns exactly what was last set.
    pub fn steady() -> Self {
        Self {
            state: Mutex::new(State::default()),
            drift: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Override the climate reported by the sensor on `sensor_pin`.
    pub fn set_climate(&self, sensor_pin: u8, temperature: f64, humidity: f64) {
        let mut state = self.lock();
        if let Some(f) = state.fridges.iter_mut().find(|f| f.sensor_pin == sensor_pin) {
            f.climate = ClimateReading {
                temperature,
                humidity,
            };
        }
    }

    /// Make the sensor on `sensor_pin` fail every read until cleared.
    pub fn set_sensor_failing(&self, sensor_pin: u8, failing: bool) {
        let mut state = self.lock();
        if let Some(f) = state.fridges.iter_mut().find(|f| f.sensor_pin == sensor_pin) {
            f.sensor_failing = failing;
        }
    }

    /// Open or close a door and notify the door monitor, as a contact edge would.
    pub fn set_door(&self, door_pin: u8, open: bool) {
        let mut state = self.lock();
        let Some(f) = state.fridges.iter_mut().find(|f| f.door_pin == door_pin) else {
            warn!(pin = door_pin, "Simulated door toggle on unknown pin");
            return;
        };
        if f.door_open == open {
            return;
        }
        f.door_open = open;

        let transition = DoorTransition {
            fridge_id: f.fridge_id,
            pin: door_pin,
        };
        if let Err(e) = f.events.try_send(transition) {
            warn!(pin = door_pin, error = %e, "Dropped simulated door transition");
        }
    }

    pub fn relay_state(&self, relay_pin: u8) -> Option<bool> {
        self.lock()
            .fridges
            .iter()
            .find(|f| f.relay_pin == relay_pin)
            .map(|f| f.relay_on)
    }

    /// Durations of every buzzer activation so far. Only the steady
    /// simulation records them; a drifting one runs unattended.
    pub fn buzzes(&self) -> Vec<Duration> {
        self.lock().buzzes.clone()
    }
}

impl Hardware for SimulatedHardware {
    fn attach_fridge(
        &self,
        fridge: &Fridge,
        events: mpsc::Sender<DoorTransition>,
    ) -> Result<(), HardwareError> {
        let mut climate = ClimateReading {
            temperature: fridge.target_temp + 0.5,
            humidity: DEFAULT_HUMIDITY,
        };
        if self.drift {
            let mut rng = rand::thread_rng();
            climate.temperature += rng.gen_range(-0.5..0.5);
            climate.humidity += rng.gen_range(-5.0..5.0);
        }

        let simulated = SimulatedFridge {
            fridge_id: fridge.id,
            sensor_pin: pin(fridge.sensor_pin)?,
            door_pin: pin(fridge.door_sensor_pin)?,
            relay_pin: pin(fridge.relay_pin)?,
            climate,
            sensor_failing: false,
            door_open: false,
            relay_on: fridge.compressor_status,
            events,
        };
        debug!(fridge_id = fridge.id, ?simulated, "Simulated fridge attached");

        let mut state = self.lock();
        state.fridges.retain(|f| f.fridge_id != fridge.id);
        state.fridges.push(simulated);
        Ok(())
    }

    fn read_climate(&self, pin: u8) -> Result<ClimateReading, HardwareError> {
        let mut state = self.lock();
        let f = state
            .fridges
            .iter_mut()
            .find(|f| f.sensor_pin == pin)
            .ok_or(HardwareError::UnconfiguredPin { pin })?;

        if f.sensor_failing {
            return Err(HardwareError::SensorRead { pin });
        }
        if !self.drift {
            return Ok(f.climate);
        }

        let mut rng = rand::thread_rng();
        f.climate.temperature += rng.gen_range(-0.2..0.2);
        f.climate.humidity = (f.climate.humidity + rng.gen_range(-1.0..1.0)).clamp(0.0, 100.0);
        let reading = f.climate;

        // Effects show up on the next read.
        if f.relay_on {
            f.climate.temperature -= rng.gen_range(0.1..0.3);
        }
        if f.door_open {
            f.climate.temperature += rng.gen_range(0.1..0.3);
        }

        debug!(
            pin,
            temperature = reading.temperature,
            humidity = reading.humidity,
            "Simulated DHT22 reading"
        );
        Ok(reading)
    }

    fn read_door(&self, pin: u8) -> Result<bool, HardwareError> {
        self.lock()
            .fridges
            .iter()
            .find(|f| f.door_pin == pin)
            .map(|f| f.door_open)
            .ok_or(HardwareError::UnconfiguredPin { pin })
    }

    fn set_relay(&self, pin: u8, on: bool) -> Result<(), HardwareError> {
        let mut state = self.lock();
        let f = state
            .fridges
            .iter_mut()
            .find(|f| f.relay_pin == pin)
            .ok_or(HardwareError::UnconfiguredPin { pin })?;
        f.relay_on = on;
        debug!(pin, on, "Simulated relay switched");
        Ok(())
    }

    fn sound_buzzer(&self, duration: Duration) {
        debug!(seconds = duration.as_secs_f64(), "Simulated buzzer");
        if !self.drift {
            self.lock().buzzes.push(duration);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn fridge() -> Fridge {
        Fridge {
            id: 7,
            name: "Test".into(),
            description: None,
            target_temp: 4.0,
            min_temp_threshold: 2.0,
            max_temp_threshold: 8.0,
            door_open_alert_seconds: 60,
            compressor_status: true,
            maintenance_interval_days: 365,
            last_maintenance_date: None,
            created_at: Utc::now(),
            sensor_pin: 4,
            door_sensor_pin: 17,
            relay_pin: 18,
        }
    }

    #[test]
    fn steady_simulation_reports_scripted_climate() {
        let hw = SimulatedHardware::steady();
        let (tx, _rx) = mpsc::channel(4);
        hw.attach_fridge(&fridge(), tx).unwrap();

        assert_eq!(hw.read_climate(4).unwrap().temperature, 4.5);
        hw.set_climate(4, 9.0, 50.0);
        let r = hw.read_climate(4).unwrap();
        assert_eq!(r.temperature, 9.0);
        assert_eq!(r.humidity, 50.0);
    }

    #[test]
    fn failing_sensor_returns_error() {
        let hw = SimulatedHardware::steady();
        let (tx, _rx) = mpsc::channel(4);
        hw.attach_fridge(&fridge(), tx).unwrap();

        hw.set_sensor_failing(4, true);
        assert!(matches!(hw.read_climate(4), Err(HardwareError::SensorRead { pin: 4 })));
    }

    #[test]
    fn relay_starts_at_stored_compressor_state() {
        let hw = SimulatedHardware::steady();
        let (tx, _rx) = mpsc::channel(4);
        hw.attach_fridge(&fridge(), tx).unwrap();

        assert_eq!(hw.relay_state(18), Some(true));
        hw.set_relay(18, false).unwrap();
        assert_eq!(hw.relay_state(18), Some(false));
    }

    #[test]
    fn unknown_pins_are_rejected() {
        let hw = SimulatedHardware::steady();
        assert!(matches!(hw.read_door(5), Err(HardwareError::UnconfiguredPin { pin: 5 })));
        assert!(hw.set_relay(5, true).is_err());
    }

    #[test]
    fn door_toggle_pushes_one_transition_per_change() {
        let hw = SimulatedHardware::steady();
        let (tx, mut rx) = mpsc::channel(4);
        hw.attach_fridge(&fridge(), tx).unwrap();

        hw.set_door(17, true);
        hw.set_door(17, true);
        assert!(hw.read_door(17).unwrap());
        assert_eq!(rx.try_recv().unwrap(), DoorTransition { fridge_id: 7, pin: 17 });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drifting_sensor_stays_near_baseline() {
        let hw = SimulatedHardware::new();
        let (tx, _rx) = mpsc::channel(4);
        let mut f = fridge();
        f.compressor_status = false;
        hw.attach_fridge(&f, tx).unwrap();

        for _ in 0..10 {
            let r = hw.read_climate(4).unwrap();
            assert!((0.0..=9.0).contains(&r.temperature));
            assert!((0.0..=100.0).contains(&r.humidity));
        }
    }

    #[test]
    fn buzzer_activations_are_recorded() {
        let hw = SimulatedHardware::steady();
        hw.sound_buzzer(Duration::from_millis(500));
        assert_eq!(hw.buzzes(), vec![Duration::from_millis(500)]);
    }

    #[test]
    fn drifting_simulation_keeps_no_buzzer_history() {
        let hw = SimulatedHardware::new();
        for _ in 0..100 {
            hw.sound_buzzer(Duration::from_millis(500));
        }
        assert!(hw.buzzes().is_empty());
    }
}
