//! MQTT message model
//!
//! Outbound sensor payload encoding and the inbound message inbox.

use crate::NodeError;
use crate::config;
use crate::sensor::SensorReading;
use core::fmt::Write;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use heapless::String;
use log::warn;

/// Longest inbound text kept; the display shows at most one row of it anyway
pub const MAX_INBOUND_TEXT: usize = 128;

/// Encoded sensor payload
pub type Payload = String<96>;

/// Inbound topics the node subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Quote,
    Summary,
    UrgencyLevel,
}

impl Topic {
    pub const SUBSCRIPTIONS: [Topic; 3] = [Topic::Quote, Topic::Summary, Topic::UrgencyLevel];

    pub fn from_topic_name(name: &str) -> Option<Self> {
        match name {
            config::TOPIC_DISPLAY_QUOTE => Some(Topic::Quote),
            config::TOPIC_DISPLAY_SUMMARY => Some(Topic::Summary),
            config::TOPIC_URGENCY_LED => Some(Topic::UrgencyLevel),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Topic::Quote => config::TOPIC_DISPLAY_QUOTE,
            Topic::Summary => config::TOPIC_DISPLAY_SUMMARY,
            Topic::UrgencyLevel => config::TOPIC_URGENCY_LED,
        }
    }
}

/// A message received from the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub text: String<MAX_INBOUND_TEXT>,
}

impl InboundMessage {
    /// Build a message from a raw publish.
    ///
    /// Unknown topics and payloads that are not UTF-8 are dropped; overlong
    /// text is cut at the last whole character that fits.
    pub fn from_publish(topic_name: &str, payload: &[u8]) -> Option<Self> {
        let Some(topic) = Topic::from_topic_name(topic_name) else {
            warn!("[MQTT] Ignoring message on unexpected topic {}", topic_name);
            return None;
        };
        let Ok(body) = core::str::from_utf8(payload) else {
            warn!("[MQTT] Dropping non UTF-8 payload on {}", topic_name);
            return None;
        };

        let mut text = String::new();
        for c in body.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Some(Self { topic, text })
    }
}

/// Bounded queue between the session poll and the loop
pub type Inbox = Channel<NoopRawMutex, InboundMessage, { config::INBOX_DEPTH }>;

/// Queue a message, dropping it with a warning when the inbox is full
pub fn enqueue(inbox: &Inbox, message: InboundMessage) -> bool {
    match inbox.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            warn!("[MQTT] Inbox full, dropping {:?} message", dropped.topic);
            false
        }
    }
}

/// Encode a reading as the JSON payload published on the sensor topic
pub fn encode_payload(reading: &SensorReading) -> Result<Payload, NodeError> {
    let mut payload = Payload::new();
    write!(
        payload,
        "{{\"temperature\":{:.1}, \"humidity\":{:.1}, \"light_percent\":{}, \"nox_percent\":{}}}",
        reading.temperature, reading.humidity, reading.light_percent, reading.air_quality_percent
    )
    .map_err(|_| NodeError::FormatError)?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature: f32, humidity: f32) -> SensorReading {
        SensorReading {
            temperature,
            humidity,
            light_percent: 70,
            light_digital_high: false,
            air_quality_percent: 10,
            air_quality_raw: 409,
            motion_detected: false,
        }
    }

    #[test]
    fn payload_matches_backend_format() {
        let payload = encode_payload(&reading(25.0, 40.0)).unwrap();
        assert_eq!(
            payload.as_str(),
            "{\"temperature\":25.0, \"humidity\":40.0, \"light_percent\":70, \"nox_percent\":10}"
        );
    }

    #[test]
    fn payload_rounds_to_one_decimal() {
        let payload = encode_payload(&reading(-12.34, 99.96)).unwrap();
        assert!(payload.starts_with("{\"temperature\":-12.3, \"humidity\":100.0,"));
    }

    #[test]
    fn topics_resolve_by_name() {
        for topic in Topic::SUBSCRIPTIONS {
            assert_eq!(Topic::from_topic_name(topic.name()), Some(topic));
        }
        assert_eq!(Topic::from_topic_name("auralink/sensor/data"), None);
    }

    #[test]
    fn inbound_text_is_validated_and_bounded() {
        assert!(InboundMessage::from_publish(config::TOPIC_DISPLAY_QUOTE, &[0xFF, 0xFE]).is_none());
        assert!(InboundMessage::from_publish("other/topic", b"hello").is_none());

        let long = "é".repeat(100);
        let message = InboundMessage::from_publish(config::TOPIC_DISPLAY_SUMMARY, long.as_bytes())
            .unwrap();
        assert_eq!(message.topic, Topic::Summary);
        assert_eq!(message.text.chars().count(), MAX_INBOUND_TEXT / 2);
    }

    #[test]
    fn full_inbox_drops_the_newest_message() {
        let inbox = Inbox::new();
        for i in 0..config::INBOX_DEPTH {
            let text = if i == 0 { "HIGH" } else { "LOW" };
            let message =
                InboundMessage::from_publish(config::TOPIC_URGENCY_LED, text.as_bytes()).unwrap();
            assert!(enqueue(&inbox, message));
        }
        let late = InboundMessage::from_publish(config::TOPIC_DISPLAY_QUOTE, b"late").unwrap();
        assert!(!enqueue(&inbox, late));

        assert_eq!(inbox.try_receive().unwrap().text.as_str(), "HIGH");
        let mut remaining = 0;
        while let Ok(message) = inbox.try_receive() {
            assert_eq!(message.topic, Topic::UrgencyLevel);
            remaining += 1;
        }
        assert_eq!(remaining, config::INBOX_DEPTH - 1);
    }
}
