#![cfg_attr(not(test), no_std)]

//! AuraLink ESP32-C3 Sensor Node Library
//!
//! This library provides the decision loop of an environmental sensor node:
//! it samples climate, light, air-quality and motion sensors, drives status
//! LEDs from threshold rules, renders a 20x4 character display and exchanges
//! data with the AuraLink backend over MQTT.
//!
//! The loop only talks to hardware through the port traits in [`sensor`],
//! [`display`], [`led_control`] and [`link`]. Board adapters for the
//! ESP32-C3 live behind the `esp32c3` feature.

extern crate alloc;

pub mod dht;
pub mod display;
pub mod lcd;
pub mod led_control;
pub mod link;
pub mod message;
pub mod node;
pub mod sensor;
pub mod state_machine;

#[cfg(feature = "esp32c3")]
pub mod board;
#[cfg(feature = "esp32c3")]
pub mod mqtt;
#[cfg(feature = "esp32c3")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Default configuration constants
pub mod config {
    use crate::led_control::TemperaturePolicy;
    use embassy_time::Duration;

    /// WiFi configuration
    /// Read from environment variables at compile time
    pub const WIFI_SSID: &str = env!("WIFI_SSID");
    pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

    /// Status checks made after starting a WiFi join before giving up and restarting
    pub const JOIN_ATTEMPTS: u32 = 20;

    /// Delay between two WiFi status checks
    pub const JOIN_RETRY_DELAY: Duration = Duration::from_millis(500);

    /// Delay between two MQTT session attempts (no backoff, no cap)
    pub const SESSION_RETRY_DELAY: Duration = Duration::from_secs(5);

    /// MQTT broker, overridable at build time through `MQTT_BROKER_HOST`
    pub const MQTT_BROKER_HOST: &str = env!("MQTT_BROKER_HOST");
    pub const MQTT_BROKER_PORT: u16 = 1883;
    pub const MQTT_CLIENT_ID: &str = "auralink-node";
    pub const MQTT_KEEP_ALIVE_SECS: u16 = 60;

    /// How long the session listens for inbound publishes per iteration
    pub const INBOUND_POLL_WINDOW: Duration = Duration::from_millis(100);

    /// Inbound messages queued between two drains
    pub const INBOX_DEPTH: usize = 4;

    /// Topics
    pub const TOPIC_SENSOR_DATA: &str = "auralink/sensor/data";
    pub const TOPIC_DISPLAY_QUOTE: &str = "auralink/display/quote";
    pub const TOPIC_DISPLAY_SUMMARY: &str = "auralink/display/summary";
    pub const TOPIC_URGENCY_LED: &str = "auralink/urgency/led";

    /// Loop cadence after a complete iteration
    pub const LOOP_CADENCE: Duration = Duration::from_millis(2000);

    /// Loop cadence after a failed climate read
    pub const SENSOR_RETRY_DELAY: Duration = Duration::from_millis(1000);

    /// Indicator refresh period while the loop waits
    pub const INDICATOR_TICK: Duration = Duration::from_millis(50);

    /// Boot screen hold time
    pub const BOOT_SCREEN_HOLD: Duration = Duration::from_millis(800);

    /// Air quality bands (percent)
    pub const AIR_QUALITY_CLEAR_MAX: u8 = 30;
    pub const AIR_QUALITY_CAUTION_MAX: u8 = 60;
    pub const AIR_QUALITY_PULSE: Duration = Duration::from_millis(200);

    /// Comfortable temperature band (°C, inclusive)
    pub const TEMPERATURE_LOW: f32 = 20.0;
    pub const TEMPERATURE_HIGH: f32 = 30.0;
    pub const TEMPERATURE_POLICY: TemperaturePolicy = TemperaturePolicy::Asymmetric {
        hot: Duration::from_millis(150),
        cold: Duration::from_millis(500),
    };

    /// Light indicator is lit at or below this ambient percentage
    pub const LIGHT_DARK_MAX: u8 = 50;
    pub const LIGHT_INDICATOR_ACTIVE_LOW: bool = false;

    /// Motion indicator toggle interval
    pub const MOTION_BLINK_INTERVAL: Duration = Duration::from_millis(100);

    /// Full scale of the 12-bit ADC
    pub const ADC_MAX: u16 = 4095;

    /// Display geometry and I2C backpack address
    pub const LCD_I2C_ADDRESS: u8 = 0x27;
    pub const LCD_COLUMNS: usize = 20;
    pub const LCD_ROWS: usize = 4;
}

/// Error types for the sensor node adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// WiFi configuration or join error
    WiFiError,
    /// MQTT session error (DNS, TCP, CONNECT, SUBSCRIBE or PUBLISH)
    SessionError,
    /// Character display bus error
    DisplayError,
    /// Fixed-capacity buffer too small for a formatted value
    FormatError,
}
