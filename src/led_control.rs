//! Status LED control
//!
//! Maps sensor readings onto the five status LEDs. Every LED is modelled as
//! non-blocking state: a policy decides what the LED should do for the
//! current iteration, and [`Indicators::refresh`] evaluates it against a
//! monotonic clock sample. The loop calls `refresh` every few tens of
//! milliseconds while it waits, which plays pulses and blinks without ever
//! sleeping inside the policy.

use crate::config;
use crate::sensor::SensorReading;
use embassy_time::{Duration, Instant};
use log::info;

/// The five LEDs on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    AirQuality,
    Motion,
    Temperature,
    Light,
    Urgency,
}

/// Output side of the LEDs
pub trait IndicatorBank {
    /// Drive the pin of `indicator` to the given electrical level
    fn set_level(&mut self, indicator: Indicator, high: bool);
}

/// Pulse widths of the temperature LED when the reading leaves the comfort band
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperaturePolicy {
    /// Same pulse for hot and cold
    Symmetric { pulse: Duration },
    /// Short pulse when hot, long pulse when cold
    Asymmetric { hot: Duration, cold: Duration },
}

/// Air quality bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirQualityBand {
    Clear,
    Caution,
    Polluted,
}

impl AirQualityBand {
    pub fn from_percent(percent: u8) -> Self {
        if percent <= config::AIR_QUALITY_CLEAR_MAX {
            AirQualityBand::Clear
        } else if percent > config::AIR_QUALITY_CAUTION_MAX {
            AirQualityBand::Polluted
        } else {
            AirQualityBand::Caution
        }
    }
}

/// Temperature bands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureBand {
    Cold,
    Comfortable,
    Hot,
}

impl TemperatureBand {
    pub fn from_celsius(temperature: f32) -> Self {
        if temperature > config::TEMPERATURE_HIGH {
            TemperatureBand::Hot
        } else if temperature < config::TEMPERATURE_LOW {
            TemperatureBand::Cold
        } else {
            TemperatureBand::Comfortable
        }
    }
}

/// Logical light LED state: lit when the room is dark
pub fn light_indicator_on(light_percent: u8) -> bool {
    light_percent <= config::LIGHT_DARK_MAX
}

/// Command carried by a message on the urgency topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgencyCommand {
    On,
    Off,
    /// `MEDIUM` is reserved for a slow blink and leaves the LED as it is
    Unchanged,
}

impl UrgencyCommand {
    pub fn from_text(text: &str) -> Self {
        if text.contains("HIGH") {
            UrgencyCommand::On
        } else if text.contains("MEDIUM") {
            UrgencyCommand::Unchanged
        } else {
            UrgencyCommand::Off
        }
    }
}

/// One pulse: on for `width` after `start`, off afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    start: Instant,
    width: Duration,
}

impl Pulse {
    pub fn new(start: Instant, width: Duration) -> Self {
        Self { start, width }
    }

    pub fn is_on(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start) < self.width
    }
}

/// What a LED does until the next iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Off,
    Steady,
    Pulse(Pulse),
}

impl Drive {
    fn is_on(&self, now: Instant) -> bool {
        match self {
            Drive::Off => false,
            Drive::Steady => true,
            Drive::Pulse(pulse) => pulse.is_on(now),
        }
    }
}

/// Non-blocking blink state of the motion LED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlinkState {
    last_toggle: Option<Instant>,
    is_on: bool,
}

impl BlinkState {
    /// Advance the blink for one clock sample and return the LED state
    pub fn update(&mut self, motion: bool, now: Instant) -> bool {
        if !motion {
            *self = BlinkState::default();
            return false;
        }

        let due = match self.last_toggle {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= config::MOTION_BLINK_INTERVAL,
        };
        if due {
            self.last_toggle = Some(now);
            self.is_on = !self.is_on;
        }
        self.is_on
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }
}

/// Logical state of every LED at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndicatorLevels {
    pub air_quality: bool,
    pub motion: bool,
    pub temperature: bool,
    pub light: bool,
    pub urgency: bool,
}

/// Persistent LED state, part of the loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicators {
    policy: TemperaturePolicy,
    air_quality: Drive,
    temperature: Drive,
    light: bool,
    motion_detected: bool,
    blink: BlinkState,
    urgency: bool,
}

impl Indicators {
    pub fn new(policy: TemperaturePolicy) -> Self {
        Self {
            policy,
            air_quality: Drive::Off,
            temperature: Drive::Off,
            light: false,
            motion_detected: false,
            blink: BlinkState::default(),
            urgency: false,
        }
    }

    /// Apply the threshold policies to a fresh reading taken at `now`
    pub fn actuate(&mut self, reading: &SensorReading, now: Instant) {
        self.air_quality = match AirQualityBand::from_percent(reading.air_quality_percent) {
            AirQualityBand::Clear => Drive::Off,
            AirQualityBand::Polluted => Drive::Steady,
            AirQualityBand::Caution => Drive::Pulse(Pulse::new(now, config::AIR_QUALITY_PULSE)),
        };

        self.temperature = match (TemperatureBand::from_celsius(reading.temperature), self.policy) {
            (TemperatureBand::Comfortable, _) => Drive::Steady,
            (_, TemperaturePolicy::Symmetric { pulse }) => Drive::Pulse(Pulse::new(now, pulse)),
            (TemperatureBand::Hot, TemperaturePolicy::Asymmetric { hot, .. }) => {
                Drive::Pulse(Pulse::new(now, hot))
            }
            (TemperatureBand::Cold, TemperaturePolicy::Asymmetric { cold, .. }) => {
                Drive::Pulse(Pulse::new(now, cold))
            }
        };

        self.light = light_indicator_on(reading.light_percent);
        self.motion_detected = reading.motion_detected;
    }

    /// Apply an urgency command received from the backend
    pub fn apply_urgency(&mut self, command: UrgencyCommand) {
        match command {
            UrgencyCommand::On => self.urgency = true,
            UrgencyCommand::Off => self.urgency = false,
            UrgencyCommand::Unchanged => {}
        }
        info!("[LED] Urgency {:?} -> {}", command, self.urgency);
    }

    /// Evaluate every LED at `now` and write the pins
    pub fn refresh<B: IndicatorBank>(&mut self, now: Instant, bank: &mut B) -> IndicatorLevels {
        let levels = IndicatorLevels {
            air_quality: self.air_quality.is_on(now),
            motion: self.blink.update(self.motion_detected, now),
            temperature: self.temperature.is_on(now),
            light: self.light,
            urgency: self.urgency,
        };

        bank.set_level(Indicator::AirQuality, levels.air_quality);
        bank.set_level(Indicator::Motion, levels.motion);
        bank.set_level(Indicator::Temperature, levels.temperature);
        bank.set_level(
            Indicator::Light,
            levels.light != config::LIGHT_INDICATOR_ACTIVE_LOW,
        );
        bank.set_level(Indicator::Urgency, levels.urgency);

        levels
    }

}

impl Default for Indicators {
    fn default() -> Self {
        Self::new(config::TEMPERATURE_POLICY)
    }
}
