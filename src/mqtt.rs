//! MQTT session on top of embassy-net and rust-mqtt v0.3

use crate::NodeError;
use crate::config;
use crate::link::MessagingPort;
use crate::message::{InboundMessage, Inbox, Topic, enqueue};
use embassy_net::Stack;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_time::{Duration, Instant, with_timeout};
use log::{error, info, warn};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

const TCP_BUFFER_SIZE: usize = 1024;
const MQTT_BUFFER_SIZE: usize = 512;
const TCP_TIMEOUT: Duration = Duration::from_secs(10);

/// Socket and client buffers, reused by every reconnect
pub struct SessionBuffers {
    tcp_rx: [u8; TCP_BUFFER_SIZE],
    tcp_tx: [u8; TCP_BUFFER_SIZE],
    mqtt_rx: [u8; MQTT_BUFFER_SIZE],
    mqtt_tx: [u8; MQTT_BUFFER_SIZE],
}

impl SessionBuffers {
    pub const fn new() -> Self {
        Self {
            tcp_rx: [0; TCP_BUFFER_SIZE],
            tcp_tx: [0; TCP_BUFFER_SIZE],
            mqtt_rx: [0; MQTT_BUFFER_SIZE],
            mqtt_tx: [0; MQTT_BUFFER_SIZE],
        }
    }
}

impl Default for SessionBuffers {
    fn default() -> Self {
        Self::new()
    }
}

/// A connected and subscribed broker session
pub struct BrokerSession<'a> {
    client: MqttClient<'a, TcpSocket<'a>, 5, CountingRng>,
    connected: bool,
    last_activity: Instant,
}

/// Resolve the broker, connect TCP, send CONNECT and subscribe to the inbound topics
pub async fn open_session<'a>(
    stack: Stack<'a>,
    buffers: &'a mut SessionBuffers,
) -> Result<BrokerSession<'a>, NodeError> {
    info!("[MQTT] Resolving {}", config::MQTT_BROKER_HOST);
    let addresses = stack
        .dns_query(config::MQTT_BROKER_HOST, DnsQueryType::A)
        .await
        .map_err(|e| {
            warn!("[MQTT] DNS query failed: {:?}", e);
            NodeError::SessionError
        })?;
    let Some(&address) = addresses.first() else {
        warn!("[MQTT] DNS returned no addresses");
        return Err(NodeError::SessionError);
    };

    let SessionBuffers {
        tcp_rx,
        tcp_tx,
        mqtt_rx,
        mqtt_tx,
    } = buffers;

    let mut socket = TcpSocket::new(stack, tcp_rx, tcp_tx);
    socket.set_timeout(Some(TCP_TIMEOUT));
    info!("[MQTT] Connecting TCP to {}:{}", address, config::MQTT_BROKER_PORT);
    socket
        .connect((address, config::MQTT_BROKER_PORT))
        .await
        .map_err(|e| {
            warn!("[MQTT] TCP connect failed: {:?}", e);
            NodeError::SessionError
        })?;

    let mut client_config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20_000));
    client_config.add_client_id(config::MQTT_CLIENT_ID);
    client_config.add_max_subscribe_qos(QualityOfService::QoS0);
    client_config.keep_alive = config::MQTT_KEEP_ALIVE_SECS;
    client_config.max_packet_size = MQTT_BUFFER_SIZE as u32;

    let mut client = MqttClient::<_, 5, _>::new(
        socket,
        mqtt_tx,
        MQTT_BUFFER_SIZE,
        mqtt_rx,
        MQTT_BUFFER_SIZE,
        client_config,
    );

    client.connect_to_broker().await.map_err(|e| {
        error!("[MQTT] CONNECT refused: {:?}", e);
        NodeError::SessionError
    })?;

    for topic in Topic::SUBSCRIPTIONS {
        client.subscribe_to_topic(topic.name()).await.map_err(|e| {
            error!("[MQTT] Subscribe to {} failed: {:?}", topic.name(), e);
            NodeError::SessionError
        })?;
        info!("[MQTT] Subscribed to {}", topic.name());
    }

    info!("[MQTT] Connected to {}", config::MQTT_BROKER_HOST);
    Ok(BrokerSession {
        client,
        connected: true,
        last_activity: Instant::now(),
    })
}

impl BrokerSession<'_> {
    fn mark_disconnected(&mut self, reason: ReasonCode) {
        if self.connected {
            warn!("[MQTT] Session lost: {:?}", reason);
        }
        self.connected = false;
    }

    async fn keep_alive(&mut self) {
        let half_interval = Duration::from_secs(config::MQTT_KEEP_ALIVE_SECS as u64 / 2);
        if self.last_activity.elapsed() < half_interval {
            return;
        }
        match self.client.send_ping().await {
            Ok(()) => self.last_activity = Instant::now(),
            Err(e) => self.mark_disconnected(e),
        }
    }
}

impl MessagingPort for BrokerSession<'_> {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), NodeError> {
        if !self.connected {
            return Err(NodeError::SessionError);
        }
        match self
            .client
            .send_message(topic, payload, QualityOfService::QoS0, false)
            .await
        {
            // Published, just nobody listening
            Ok(()) | Err(ReasonCode::NoMatchingSubscribers) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Err(e) => {
                self.mark_disconnected(e);
                Err(NodeError::SessionError)
            }
        }
    }

    async fn poll_inbound(&mut self, inbox: &Inbox) {
        if !self.connected {
            return;
        }
        self.keep_alive().await;

        // Each publish gets its own window; stop at the first quiet one
        for _ in 0..config::INBOX_DEPTH {
            if !self.connected {
                return;
            }
            match with_timeout(config::INBOUND_POLL_WINDOW, self.client.receive_message()).await {
                Err(_) => return,
                Ok(Ok((topic, payload))) => {
                    if let Some(message) = InboundMessage::from_publish(topic, payload) {
                        enqueue(inbox, message);
                    }
                    self.last_activity = Instant::now();
                }
                Ok(Err(e)) => self.mark_disconnected(e),
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
