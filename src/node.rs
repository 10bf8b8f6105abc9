//! Sensor node decision loop
//!
//! One iteration runs four stages in a fixed order: session poll, sensor
//! acquisition, actuation, then reporting and display. Everything that
//! outlives an iteration lives in [`LoopState`].

use crate::config;
use crate::display::{CharDisplay, Frame, Screen};
use crate::led_control::{IndicatorBank, Indicators, UrgencyCommand};
use crate::link::{ConnectionState, MessagingPort};
use crate::message::{InboundMessage, Inbox, Topic, encode_payload};
use crate::sensor::{ClimateSensor, SensorInputs, SensorReading, read_sensors};
use embassy_time::{Duration, Instant, Timer};
use log::{info, warn};

/// State carried from one iteration to the next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopState {
    pub connection: ConnectionState,
    pub indicators: Indicators,
}

/// Result of one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Completed,
    /// Climate sensor returned NaN, nothing was actuated or published
    SensorFault,
}

impl IterationOutcome {
    /// Wait before the next iteration
    pub fn cadence(&self) -> Duration {
        match self {
            IterationOutcome::Completed => config::LOOP_CADENCE,
            IterationOutcome::SensorFault => config::SENSOR_RETRY_DELAY,
        }
    }
}

/// The sensor node: owns the sensor, display and LED ports
pub struct Node<C, I, D, B> {
    climate: C,
    inputs: I,
    screen: Screen<D>,
    bank: B,
    state: LoopState,
    inbox: Inbox,
}

impl<C, I, D, B> Node<C, I, D, B>
where
    C: ClimateSensor,
    I: SensorInputs,
    D: CharDisplay,
    B: IndicatorBank,
{
    pub fn new(climate: C, inputs: I, screen: Screen<D>, bank: B, indicators: Indicators) -> Self {
        Self {
            climate,
            inputs,
            screen,
            bank,
            state: LoopState {
                connection: ConnectionState::default(),
                indicators,
            },
            inbox: Inbox::new(),
        }
    }

    /// Run one iteration.
    ///
    /// The clock is sampled after the session poll so pulses started by
    /// this iteration get their full width. Inbound messages are applied
    /// even when the climate sensor faults.
    pub async fn iterate<S: MessagingPort>(&mut self, session: &mut S) -> IterationOutcome {
        if session.is_connected() {
            session.poll_inbound(&self.inbox).await;
        }
        self.state.connection.session_connected = session.is_connected();
        let now = Instant::now();

        let reading = match read_sensors(&mut self.climate, &mut self.inputs) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("[SENSOR] Failed to read from DHT sensor: {:?}", e);
                let mut frame = Frame::sensor_error();
                self.drain_inbox(&mut frame);
                self.state.indicators.refresh(now, &mut self.bank);
                self.screen.render(&frame);
                return IterationOutcome::SensorFault;
            }
        };
        log_reading(&reading);

        actuate(&mut self.state, &reading, now);

        let mut frame = Frame::reading(&reading);
        self.drain_inbox(&mut frame);
        self.state.indicators.refresh(now, &mut self.bank);

        self.publish_and_render(session, &reading, &frame).await;
        IterationOutcome::Completed
    }

    fn drain_inbox(&mut self, frame: &mut Frame) {
        while let Ok(message) = self.inbox.try_receive() {
            apply_inbound(&mut self.state, frame, &message);
        }
    }

    /// Report the reading upstream, then draw the frame
    pub async fn publish_and_render<S: MessagingPort>(
        &mut self,
        session: &mut S,
        reading: &SensorReading,
        frame: &Frame,
    ) {
        publish_reading(&mut self.state, session, reading).await;
        self.screen.render(frame);
    }

    /// Refresh the LEDs at clock sample `now`
    pub fn tick(&mut self, now: Instant) {
        self.state.indicators.refresh(now, &mut self.bank);
    }

    /// Wait `period` while keeping pulses and blinks running
    pub async fn idle(&mut self, period: Duration) {
        let end = Instant::now() + period;
        loop {
            let now = Instant::now();
            self.tick(now);
            if now >= end {
                break;
            }
            let remaining = end.saturating_duration_since(now);
            Timer::after(remaining.min(config::INDICATOR_TICK)).await;
        }
    }

    /// Show a frame outside the regular iteration (boot and link screens)
    pub fn show(&mut self, frame: &Frame) {
        self.screen.render(frame);
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.state.connection = connection;
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    pub fn screen(&self) -> &Screen<D> {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen<D> {
        &mut self.screen
    }

    pub fn bank(&self) -> &B {
        &self.bank
    }
}

fn log_reading(reading: &SensorReading) {
    info!(
        "[SENSOR] T={:.1}C H={:.1}% light={}% ({}) NOx={}% raw={} PIR={}",
        reading.temperature,
        reading.humidity,
        reading.light_percent,
        reading.light_level(),
        reading.air_quality_percent,
        reading.air_quality_raw,
        reading.motion_status()
    );
}

/// Map a fresh reading onto the indicator policies
pub fn actuate(state: &mut LoopState, reading: &SensorReading, now: Instant) {
    state.indicators.actuate(reading, now);
}

/// Apply one drained inbound message to the LEDs or the pending frame
pub fn apply_inbound(state: &mut LoopState, frame: &mut Frame, message: &InboundMessage) {
    info!("[MQTT] {} <- {}", message.topic.name(), message.text.as_str());
    match message.topic {
        Topic::UrgencyLevel => state
            .indicators
            .apply_urgency(UrgencyCommand::from_text(&message.text)),
        Topic::Quote => frame.overlay_quote(&message.text),
        Topic::Summary => frame.overlay_summary(&message.text),
    }
}

/// Publish the reading when the session is up; a failure marks it down
pub async fn publish_reading<S: MessagingPort>(
    state: &mut LoopState,
    session: &mut S,
    reading: &SensorReading,
) {
    if !state.connection.session_connected {
        return;
    }

    let payload = match encode_payload(reading) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("[MQTT] Payload encoding failed: {:?}", e);
            return;
        }
    };

    match session.publish(config::TOPIC_SENSOR_DATA, payload.as_bytes()).await {
        Ok(()) => info!("[MQTT] Published {}", payload.as_str()),
        Err(e) => {
            warn!("[MQTT] Publish failed: {:?}", e);
            state.connection.session_connected = false;
        }
    }
}
