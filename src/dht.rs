//! DHT22 humidity/temperature sensor
//!
//! The single-wire transfer is done by the `dht-sensor` driver over any
//! open-drain pin that can be both driven and sampled. A failed transfer
//! reports NaN for both values, which the acquisition stage turns into
//! [`crate::sensor::SensorError::InvalidReading`].

use crate::sensor::ClimateSensor;
use dht_sensor::{DhtError, dht22};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

/// DHT22 on one data pin
pub struct Dht22<P, D> {
    pin: P,
    delay: D,
    last: Option<dht22::Reading>,
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// The pin must be configured open-drain with a pull-up and released (high)
    pub fn new(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            last: None,
        }
    }

    /// Run one transfer
    pub fn read(&mut self) -> Result<dht22::Reading, DhtError<P::Error>> {
        // Bit timing does not survive interrupts
        critical_section::with(|_| dht22::blocking::read(&mut self.delay, &mut self.pin))
    }
}

impl<P, D> ClimateSensor for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    /// Starts a fresh transfer; the temperature of the same frame is served
    /// by the next [`ClimateSensor::read_temperature`] call.
    fn read_humidity(&mut self) -> f32 {
        self.last = match self.read() {
            Ok(reading) => Some(reading),
            Err(e) => {
                warn!("[SENSOR] DHT22 transfer failed: {:?}", e);
                None
            }
        };
        self.last.map_or(f32::NAN, |reading| reading.relative_humidity)
    }

    fn read_temperature(&mut self) -> f32 {
        self.last.map_or(f32::NAN, |reading| reading.temperature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Simulated time in nanoseconds, advanced only by the delay
    type Clock = Rc<Cell<u64>>;

    struct SimDelay(Clock);

    impl DelayNs for SimDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + ns as u64);
        }
    }

    /// Data line with a sensor answering `frame` once the host releases it
    struct SimLine {
        clock: Clock,
        released_at: Option<u64>,
        frame: [u8; 5],
    }

    impl SimLine {
        fn level(&self) -> bool {
            let Some(released) = self.released_at else {
                return false;
            };
            let t = (self.clock.get() - released) / 1_000;
            // pull-up, response low 80 µs, response high 80 µs
            if t < 20 {
                return true;
            }
            if t < 100 {
                return false;
            }
            if t < 180 {
                return true;
            }
            // each bit: low 50 µs, then high 26 µs (0) or 70 µs (1)
            let mut edge = 180;
            for byte in self.frame {
                for i in (0..8).rev() {
                    if t < edge + 50 {
                        return false;
                    }
                    let high = if (byte >> i) & 1 == 1 { 70 } else { 26 };
                    if t < edge + 50 + high {
                        return true;
                    }
                    edge += 50 + high;
                }
            }
            t >= edge + 50
        }
    }

    impl ErrorType for SimLine {
        type Error = Infallible;
    }

    impl OutputPin for SimLine {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.released_at = None;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.released_at = Some(self.clock.get());
            Ok(())
        }
    }

    impl InputPin for SimLine {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(self.level())
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(!self.level())
        }
    }

    fn sensor(frame: [u8; 5]) -> Dht22<SimLine, SimDelay> {
        let clock = Clock::default();
        let line = SimLine {
            clock: clock.clone(),
            released_at: None,
            frame,
        };
        Dht22::new(line, SimDelay(clock))
    }

    #[test]
    fn reads_humidity_and_temperature_pair() {
        // 65.2 %, 35.1 °C
        let mut dht = sensor([0x02, 0x8C, 0x01, 0x5F, 0xEE]);
        assert_eq!(dht.read_humidity(), 65.2);
        assert_eq!(dht.read_temperature(), 35.1);
    }

    #[test]
    fn negative_temperature() {
        // 40.0 %, -10.1 °C
        let mut dht = sensor([0x01, 0x90, 0x80, 0x65, 0x76]);
        assert_eq!(dht.read_humidity(), 40.0);
        assert_eq!(dht.read_temperature(), -10.1);
    }

    #[test]
    fn bad_checksum_reads_nan() {
        let mut dht = sensor([0x02, 0x8C, 0x01, 0x5F, 0x00]);
        assert!(dht.read_humidity().is_nan());
        assert!(dht.read_temperature().is_nan());
    }

    #[test]
    fn silent_sensor_reads_nan() {
        let mut dht = Dht22::new(SilentLine, SimDelay(Clock::default()));
        assert!(matches!(dht.read(), Err(DhtError::Timeout)));
        assert!(dht.read_humidity().is_nan());
        assert!(dht.read_temperature().is_nan());
    }

    /// Nothing on the bus: the line stays pulled up
    struct SilentLine;

    impl ErrorType for SilentLine {
        type Error = Infallible;
    }

    impl OutputPin for SilentLine {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    impl InputPin for SilentLine {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(true)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(false)
        }
    }
}
