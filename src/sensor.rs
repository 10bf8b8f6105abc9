//! Sensor acquisition module
//!
//! Reads the climate pair, ambient light, air quality and motion inputs and
//! turns them into one validated [`SensorReading`] per loop iteration.

use crate::config;

/// Error type for sensor acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Humidity or temperature came back as NaN
    InvalidReading,
}

/// Humidity/temperature sensor reporting both values as a pair.
///
/// Either value may be NaN when the sensor did not answer.
pub trait ClimateSensor {
    /// Relative humidity in percent
    fn read_humidity(&mut self) -> f32;
    /// Temperature in °C
    fn read_temperature(&mut self) -> f32;
}

/// Raw analog and digital inputs of the board
pub trait SensorInputs {
    /// 12-bit raw value of the light dependent resistor divider
    fn light_raw(&mut self) -> u16;
    /// Comparator output of the light module (high when dark)
    fn light_digital_high(&mut self) -> bool;
    /// 12-bit raw value of the NOx sensor
    fn air_quality_raw(&mut self) -> u16;
    /// PIR output level
    fn motion_detected(&mut self) -> bool;
}

/// One validated snapshot of every sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    /// Temperature in °C
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Ambient light, 0 (dark) to 100 (bright)
    pub light_percent: u8,
    /// Raw comparator bit of the light module
    pub light_digital_high: bool,
    /// Air quality, 0 (clean) to 100 (polluted)
    pub air_quality_percent: u8,
    /// Raw ADC value behind `air_quality_percent`
    pub air_quality_raw: u16,
    /// PIR level
    pub motion_detected: bool,
}

impl SensorReading {
    /// Light level label from the comparator bit
    pub fn light_level(&self) -> &'static str {
        if self.light_digital_high { "LOW" } else { "HIGH" }
    }

    /// Motion label shown on the display
    pub fn motion_status(&self) -> &'static str {
        if self.motion_detected {
            "Motion Detected"
        } else {
            "No Motion"
        }
    }
}

/// Integer linear map with truncating division, as used by Arduino `map()`.
///
/// `in_min` may be greater than `in_max` to invert the mapping.
pub fn map_range(value: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    if in_max == in_min {
        return out_min;
    }
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

fn clamp_percent(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// Convert raw light ADC to percent (darker raw values read brighter)
pub fn light_percent(raw: u16) -> u8 {
    clamp_percent(map_range(raw as i32, config::ADC_MAX as i32, 0, 0, 100))
}

/// Convert raw NOx ADC to percent
pub fn air_quality_percent(raw: u16) -> u8 {
    clamp_percent(map_range(raw as i32, 0, config::ADC_MAX as i32, 0, 100))
}

/// Sample every sensor once.
///
/// The climate pair is validated first; a NaN in either value rejects the
/// whole reading before the other inputs are touched.
pub fn read_sensors<C, I>(climate: &mut C, inputs: &mut I) -> Result<SensorReading, SensorError>
where
    C: ClimateSensor,
    I: SensorInputs,
{
    let humidity = climate.read_humidity();
    let temperature = climate.read_temperature();

    if humidity.is_nan() || temperature.is_nan() {
        return Err(SensorError::InvalidReading);
    }

    let light_raw = inputs.light_raw();
    let light_digital_high = inputs.light_digital_high();
    let air_quality_raw = inputs.air_quality_raw();
    let motion_detected = inputs.motion_detected();

    Ok(SensorReading {
        temperature,
        humidity,
        light_percent: light_percent(light_raw),
        light_digital_high,
        air_quality_percent: air_quality_percent(air_quality_raw),
        air_quality_raw,
        motion_detected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClimate(f32, f32);

    impl ClimateSensor for FixedClimate {
        fn read_humidity(&mut self) -> f32 {
            self.0
        }

        fn read_temperature(&mut self) -> f32 {
            self.1
        }
    }

    #[derive(Default)]
    struct FixedInputs {
        light_raw: u16,
        light_digital_high: bool,
        air_quality_raw: u16,
        motion: bool,
        reads: u32,
    }

    impl SensorInputs for FixedInputs {
        fn light_raw(&mut self) -> u16 {
            self.reads += 1;
            self.light_raw
        }

        fn light_digital_high(&mut self) -> bool {
            self.light_digital_high
        }

        fn air_quality_raw(&mut self) -> u16 {
            self.air_quality_raw
        }

        fn motion_detected(&mut self) -> bool {
            self.motion
        }
    }

    #[test]
    fn percentages_stay_in_range_and_are_monotonic() {
        let mut last_light = 100;
        let mut last_air = 0;
        for raw in 0..=config::ADC_MAX {
            let light = light_percent(raw);
            let air = air_quality_percent(raw);
            assert!(light <= 100 && air <= 100);
            assert!(light <= last_light, "light rose at raw={}", raw);
            assert!(air >= last_air, "air quality fell at raw={}", raw);
            last_light = light;
            last_air = air;
        }
        assert_eq!(light_percent(0), 100);
        assert_eq!(light_percent(4095), 0);
        assert_eq!(air_quality_percent(0), 0);
        assert_eq!(air_quality_percent(4095), 100);
    }

    #[test]
    fn out_of_range_raw_values_are_clamped() {
        assert_eq!(light_percent(u16::MAX), 0);
        assert_eq!(air_quality_percent(u16::MAX), 100);
    }

    #[test]
    fn map_range_truncates_like_arduino() {
        assert_eq!(map_range(409, 0, 4095, 0, 100), 9);
        assert_eq!(map_range(2048, 4095, 0, 0, 100), 49);
        assert_eq!(map_range(5, 3, 3, 7, 9), 7);
    }

    #[test]
    fn nan_in_either_climate_value_rejects_the_reading() {
        let mut inputs = FixedInputs::default();
        for (h, t) in [(f32::NAN, 21.0), (40.0, f32::NAN), (f32::NAN, f32::NAN)] {
            let result = read_sensors(&mut FixedClimate(h, t), &mut inputs);
            assert_eq!(result, Err(SensorError::InvalidReading));
        }
        assert_eq!(inputs.reads, 0);
    }

    #[test]
    fn valid_reading_carries_mapped_inputs() {
        let mut inputs = FixedInputs {
            light_raw: 1228,
            light_digital_high: true,
            air_quality_raw: 2457,
            motion: true,
            reads: 0,
        };
        let reading = read_sensors(&mut FixedClimate(55.5, 22.4), &mut inputs).unwrap();
        assert_eq!(reading.humidity, 55.5);
        assert_eq!(reading.temperature, 22.4);
        assert_eq!(reading.light_percent, 70);
        assert_eq!(reading.air_quality_percent, 60);
        assert_eq!(reading.air_quality_raw, 2457);
        assert_eq!(reading.light_level(), "LOW");
        assert_eq!(reading.motion_status(), "Motion Detected");
    }
}
