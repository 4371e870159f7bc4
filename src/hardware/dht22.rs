//! DHT22 (AM2302) frame handling.
//!
//! A transmission is 40 bits, MSB first: humidity ×10 (16 bits),
//! temperature ×10 as sign-magnitude (16 bits), then an 8-bit checksum equal
//! to the wrapping sum of the four data bytes. Each bit is a ~50 µs low
//! followed by a high pulse of ~27 µs for `0` or ~70 µs for `1`.

use std::{thread, time::Duration};

use super::{ClimateReading, HardwareError};

/// High pulses longer than this are read as `1`.
pub const ONE_BIT_THRESHOLD: Duration = Duration::from_micros(48);

/// Attempts made by [`read_with_retry`] before giving up.
pub const READ_ATTEMPTS: usize = 15;

/// The sensor needs about two seconds between conversions.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pack 40 pulse widths into the five frame bytes.
pub fn frame_from_pulses(pulses: &[Duration; 40]) -> [u8; 5] {
    let mut frame = [0u8; 5];
    for (i, width) in pulses.iter().enumerate() {
        if *width > ONE_BIT_THRESHOLD {
            frame[i / 8] |= 0x80 >> (i % 8);
        }
    }
    frame
}

pub fn decode(frame: [u8; 5]) -> Result<ClimateReading, HardwareError> {
    let actual = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if actual != frame[4] {
        return Err(HardwareError::Checksum {
            expected: frame[4],
            actual,
        });
    }

    let humidity = f64::from(u16::from_be_bytes([frame[0], frame[1]])) / 10.0;
    let magnitude = f64::from(u16::from_be_bytes([frame[2] & 0x7f, frame[3]])) / 10.0;
    let temperature = if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    // Datasheet range; anything outside is line noise that happened to checksum.
    if !(0.0..=100.0).contains(&humidity) || !(-40.0..=80.0).contains(&temperature) {
        return Err(HardwareError::OutOfRange {
            temperature,
            humidity,
        });
    }

    Ok(ClimateReading {
        temperature,
        humidity,
    })
}

/// Call `read` until it succeeds or `attempts` are used up, sleeping `delay`
/// between tries. Returns the last error.
pub fn read_with_retry<F>(
    attempts: usize,
    delay: Duration,
    mut read: F,
) -> Result<ClimateReading, HardwareError>
where
    F: FnMut() -> Result<ClimateReading, HardwareError>,
{
    let mut last_error = None;
    for attempt in 1..=attempts.max(1) {
        match read() {
            Ok(reading) => return Ok(reading),
            Err(e) => {
                tracing::debug!(attempt, error = %e, "DHT22 read attempt failed");
                last_error = Some(e);
            }
        }
        if attempt < attempts {
            thread::sleep(delay);
        }
    }
    Err(last_error.unwrap_or(HardwareError::SensorRead { pin: 0 }))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[test]
    fn decodes_datasheet_example() {
        // 65.2 %RH, 35.1 °C
        let r = decode([0x02, 0x8c, 0x01, 0x5f, 0xee]).unwrap();
        assert_eq!(r.humidity, 65.2);
        assert_eq!(r.temperature, 35.1);
    }

    #[test]
    fn decodes_negative_temperature() {
        // 65.2 %RH, -10.1 °C
        let r = decode([0x02, 0x8c, 0x80, 0x65, 0x73]).unwrap();
        assert_eq!(r.temperature, -10.1);
    }

    #[test]
    fn rejects_bad_checksum() {
        let err = decode([0x02, 0x8c, 0x01, 0x5f, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            HardwareError::Checksum {
                expected: 0x00,
                actual: 0xee
            }
        ));
    }

    #[test]
    fn rejects_implausible_humidity() {
        // 0x03e9 = 100.1 %
        let frame = [0x03, 0xe9, 0x00, 0x00, 0xec];
        assert!(matches!(decode(frame), Err(HardwareError::OutOfRange { .. })));
    }

    #[test]
    fn pulses_pack_msb_first() {
        let short = Duration::from_micros(27);
        let long = Duration::from_micros(70);
        let mut pulses = [short; 40];
        // 0x80 in the first byte, 0x01 in the checksum byte
        pulses[0] = long;
        pulses[39] = long;
        assert_eq!(frame_from_pulses(&pulses), [0x80, 0, 0, 0, 0x01]);
    }

    #[test]
    fn retry_returns_first_success() {
        let calls = Cell::new(0);
        let reading = read_with_retry(5, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(HardwareError::Timeout { pin: 4 })
            } else {
                Ok(ClimateReading {
                    temperature: 4.0,
                    humidity: 50.0,
                })
            }
        })
        .unwrap();
        assert_eq!(calls.get(), 3);
        assert_eq!(reading.temperature, 4.0);
    }

    #[test]
    fn retry_gives_up_with_last_error() {
        let calls = Cell::new(0);
        let err = read_with_retry(4, Duration::ZERO, || {
            calls.set(calls.get() + 1);
            Err(HardwareError::SensorRead { pin: 22 })
        })
        .unwrap_err();
        assert_eq!(calls.get(), 4);
        assert!(matches!(err, HardwareError::SensorRead { pin: 22 }));
    }
}
