//! Raspberry Pi backend built on `rppal`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread,
    time::{Duration, Instant},
};

use rppal::gpio::{Gpio, InputPin, IoPin, Level, Mode, OutputPin, PullUpDown, Trigger};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{dht22, pin, ClimateReading, DoorTransition, Hardware, HardwareError, DOOR_DEBOUNCE};
use crate::db::models::Fridge;

/// Host start signal; the DHT22 needs at least 1 ms low.
const START_SIGNAL: Duration = Duration::from_micros(1_100);
const EDGE_TIMEOUT: Duration = Duration::from_micros(200);

impl From<rppal::gpio::Error> for HardwareError {
    fn from(e: rppal::gpio::Error) -> Self {
        HardwareError::Gpio(e.to_string())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GpioHardware {
    gpio: Gpio,
    buzzer: Arc<Mutex<OutputPin>>,
    sensors: Mutex<HashMap<u8, IoPin>>,
    doors: Mutex<HashMap<u8, InputPin>>,
    relays: Mutex<HashMap<u8, OutputPin>>,
}

impl GpioHardware {
    pub fn new(buzzer_pin: u8) -> Result<Self, HardwareError> {
        let gpio = Gpio::new()?;
        let buzzer = gpio.get(buzzer_pin)?.into_output_low();
        Ok(Self {
            gpio,
            buzzer: Arc::new(Mutex::new(buzzer)),
            sensors: Mutex::new(HashMap::new()),
            doors: Mutex::new(HashMap::new()),
            relays: Mutex::new(HashMap::new()),
        })
    }
}

impl Hardware for GpioHardware {
    fn attach_fridge(
        &self,
        fridge: &Fridge,
        events: mpsc::Sender<DoorTransition>,
    ) -> Result<(), HardwareError> {
        let sensor_pin = pin(fridge.sensor_pin)?;
        let door_pin = pin(fridge.door_sensor_pin)?;
        let relay_pin = pin(fridge.relay_pin)?;

        let mut sensor = self.gpio.get(sensor_pin)?.into_io(Mode::Input);
        sensor.set_pullupdown(PullUpDown::PullUp);
        lock(&self.sensors).insert(sensor_pin, sensor);

        let mut relay = self.gpio.get(relay_pin)?.into_output_low();
        if fridge.compressor_status {
            relay.set_high();
        }
        lock(&self.relays).insert(relay_pin, relay);

        let mut door = self.gpio.get(door_pin)?.into_input_pullup();
        let fridge_id = fridge.id;
        let mut last_edge: Option<Instant> = None;
        door.set_async_interrupt(Trigger::Both, move |_level: Level| {
            let now = Instant::now();
            if last_edge.is_some_and(|t| now.duration_since(t) < DOOR_DEBOUNCE) {
                return;
            }
            last_edge = Some(now);

            let transition = DoorTransition {
                fridge_id,
                pin: door_pin,
            };
            if let Err(e) = events.try_send(transition) {
                warn!(fridge_id, pin = door_pin, error = %e, "Dropped door transition");
            }
        })?;
        lock(&self.doors).insert(door_pin, door);

        info!(
            fridge_id,
            sensor_pin, door_pin, relay_pin, "GPIO pins configured for fridge"
        );
        Ok(())
    }

    fn read_climate(&self, pin: u8) -> Result<ClimateReading, HardwareError> {
        let mut sensors = lock(&self.sensors);
        let sensor = sensors
            .get_mut(&pin)
            .ok_or(HardwareError::UnconfiguredPin { pin })?;

        dht22::read_with_retry(dht22::READ_ATTEMPTS, dht22::RETRY_DELAY, || {
            let frame = read_frame(sensor, pin)?;
            dht22::decode(frame)
        })
        .map_err(|e| {
            error!(pin, error = %e, "Failed to read from DHT22 sensor");
            HardwareError::SensorRead { pin }
        })
    }

    fn read_door(&self, pin: u8) -> Result<bool, HardwareError> {
        let doors = lock(&self.doors);
        let door = doors.get(&pin).ok_or(HardwareError::UnconfiguredPin { pin })?;
        // Pull-up: an open reed contact reads high.
        Ok(door.is_high())
    }

    fn set_relay(&self, pin: u8, on: bool) -> Result<(), HardwareError> {
        let mut relays = lock(&self.relays);
        let relay = relays
            .get_mut(&pin)
            .ok_or(HardwareError::UnconfiguredPin { pin })?;
        if on {
            relay.set_high();
        } else {
            relay.set_low();
        }
        debug!(pin, on, "Relay switched");
        Ok(())
    }

    fn sound_buzzer(&self, duration: Duration) {
        let buzzer = Arc::clone(&self.buzzer);
        thread::spawn(move || {
            let mut pin = lock(&buzzer);
            pin.set_high();
            thread::sleep(duration);
            pin.set_low();
        });
    }
}

/// Bit-bang one 40-bit transmission.
fn read_frame(sensor: &mut IoPin, pin: u8) -> Result<[u8; 5], HardwareError> {
    sensor.set_mode(Mode::Output);
    sensor.set_low();
    thread::sleep(START_SIGNAL);
    sensor.set_mode(Mode::Input);

    // Response: ~80 µs low then ~80 µs high, then the first bit's low phase.
    wait_for(sensor, Level::Low, pin)?;
    wait_for(sensor, Level::High, pin)?;
    wait_for(sensor, Level::Low, pin)?;

    let mut pulses = [Duration::ZERO; 40];
    for width in pulses.iter_mut() {
        wait_for(sensor, Level::High, pin)?;
        *width = wait_for(sensor, Level::Low, pin)?;
    }
    Ok(dht22::frame_from_pulses(&pulses))
}

/// Spin until `sensor` reads `level`; returns how long that took.
fn wait_for(sensor: &IoPin, level: Level, pin: u8) -> Result<Duration, HardwareError> {
    let start = Instant::now();
    while sensor.read() != level {
        if start.elapsed() > EDGE_TIMEOUT {
            return Err(HardwareError::Timeout { pin });
        }
    }
    Ok(start.elapsed())
}
