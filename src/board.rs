//! ESP32-C3 board adapters for the sensor and LED ports

use crate::led_control::{Indicator, IndicatorBank};
use crate::sensor::SensorInputs;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::gpio::{Input, Output};
use esp_hal::peripherals::{ADC1, GPIO0, GPIO1};

pub type SensorAdc = Adc<'static, ADC1<'static>, esp_hal::Blocking>;
pub type LightAdcPin = AdcPin<GPIO0<'static>, ADC1<'static>>;
pub type NoxAdcPin = AdcPin<GPIO1<'static>, ADC1<'static>>;

/// Analog and digital sensor inputs
pub struct BoardInputs {
    adc: SensorAdc,
    light_analog: LightAdcPin,
    nox_analog: NoxAdcPin,
    light_digital: Input<'static>,
    pir: Input<'static>,
}

impl BoardInputs {
    pub fn new(
        adc: SensorAdc,
        light_analog: LightAdcPin,
        nox_analog: NoxAdcPin,
        light_digital: Input<'static>,
        pir: Input<'static>,
    ) -> Self {
        Self {
            adc,
            light_analog,
            nox_analog,
            light_digital,
            pir,
        }
    }
}

/// Oneshot conversions finish within a few microseconds
macro_rules! read_blocking {
    ($adc:expr, $pin:expr) => {
        loop {
            if let Ok(raw) = $adc.read_oneshot($pin) {
                break raw;
            }
        }
    };
}

impl SensorInputs for BoardInputs {
    fn light_raw(&mut self) -> u16 {
        read_blocking!(self.adc, &mut self.light_analog)
    }

    fn light_digital_high(&mut self) -> bool {
        self.light_digital.is_high()
    }

    fn air_quality_raw(&mut self) -> u16 {
        read_blocking!(self.adc, &mut self.nox_analog)
    }

    fn motion_detected(&mut self) -> bool {
        self.pir.is_high()
    }
}

/// The five status LEDs
pub struct BoardLeds {
    pub air_quality: Output<'static>,
    pub motion: Output<'static>,
    pub temperature: Output<'static>,
    pub light: Output<'static>,
    pub urgency: Output<'static>,
}

impl IndicatorBank for BoardLeds {
    fn set_level(&mut self, indicator: Indicator, high: bool) {
        let pin = match indicator {
            Indicator::AirQuality => &mut self.air_quality,
            Indicator::Motion => &mut self.motion,
            Indicator::Temperature => &mut self.temperature,
            Indicator::Light => &mut self.light,
            Indicator::Urgency => &mut self.urgency,
        };
        pin.set_level(high.into());
    }
}
