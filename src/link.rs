//! Link maintenance
//!
//! Ports for the WiFi join and the MQTT session, plus the join and session
//! retry procedures driven by [`LinkSupervisor`].

use crate::NodeError;
use crate::display::{CharDisplay, Frame, Screen};
use crate::message::Inbox;
use crate::state_machine::{Action, LinkEvent, LinkState, LinkSupervisor, StateTransition};
use embassy_time::{Duration, Timer};
use log::{error, info, warn};

/// What the loop knows about the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub network_joined: bool,
    pub session_connected: bool,
}

/// Link failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// WiFi did not come up within the allowed attempts
    NetworkJoinFailed,
    /// MQTT session dropped or could not be opened
    SessionDisconnected,
}

/// WiFi station port
pub trait NetworkPort {
    /// Start joining the configured access point
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), NodeError>;
    /// True once associated and an address is configured
    fn is_joined(&mut self) -> bool;
    fn local_address(&self) -> Option<[u8; 4]>;
}

/// MQTT session port
#[allow(async_fn_in_trait)]
pub trait MessagingPort {
    /// Publish with QoS 0, not retained
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), NodeError>;
    /// Receive pending publishes into `inbox`; transport errors mark the session disconnected
    async fn poll_inbound(&mut self, inbox: &Inbox);
    fn is_connected(&self) -> bool;
}

/// Parameters of the join procedure
#[derive(Debug, Clone, Copy)]
pub struct JoinSettings<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
    pub retry_delay: Duration,
}

impl JoinSettings<'static> {
    pub fn from_config() -> Self {
        Self {
            ssid: crate::config::WIFI_SSID,
            password: crate::config::WIFI_PASSWORD,
            retry_delay: crate::config::JOIN_RETRY_DELAY,
        }
    }
}

/// Parameters of the session retry loop
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings<'a> {
    pub broker: &'a str,
    pub retry_delay: Duration,
}

impl SessionSettings<'static> {
    pub fn from_config() -> Self {
        Self {
            broker: crate::config::MQTT_BROKER_HOST,
            retry_delay: crate::config::SESSION_RETRY_DELAY,
        }
    }
}

/// Next step after a failed session attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRetry {
    /// Wait, then open the session again
    After(Duration),
    /// WiFi dropped meanwhile, go back to joining
    Rejoin,
}

/// Link condition seen between two iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Healthy,
    /// Session dropped, open a new one
    Reopen,
    /// WiFi dropped, join again
    Rejoin,
}

/// Join the WiFi network.
///
/// Starts the join once, then checks the status after every retry delay
/// until the supervisor runs out of attempts. The caller restarts the
/// device on [`LinkError::NetworkJoinFailed`].
pub async fn join_network<N, D>(
    network: &mut N,
    supervisor: &mut LinkSupervisor,
    screen: &mut Screen<D>,
    settings: &JoinSettings<'_>,
) -> Result<ConnectionState, LinkError>
where
    N: NetworkPort,
    D: CharDisplay,
{
    supervisor.handle_event(LinkEvent::JoinRequested);
    info!("[WIFI] Joining {}", settings.ssid);

    if let Err(e) = network.begin(settings.ssid, settings.password) {
        // Status polling below decides whether this was fatal
        warn!("[WIFI] Join could not be started: {:?}", e);
    }

    loop {
        for action in supervisor.update() {
            match action {
                Action::ShowJoinProgress {
                    attempt,
                    max_attempts,
                } => {
                    screen.render(&Frame::joining(settings.ssid, attempt, max_attempts));
                }
                Action::PollNetwork => {
                    Timer::after(settings.retry_delay).await;
                    if network.is_joined() {
                        supervisor.handle_event(LinkEvent::NetworkJoined);
                        let address = network.local_address();
                        if let Some(ip) = address {
                            info!("[WIFI] Joined, address {}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3]);
                        }
                        screen.render(&Frame::joined(address));
                        return Ok(supervisor.connection_state());
                    }
                    if let StateTransition::Transition(_) =
                        supervisor.handle_event(LinkEvent::JoinAttemptFailed)
                    {
                        break;
                    }
                }
                Action::RestartDevice => {
                    return Err(LinkError::NetworkJoinFailed);
                }
                Action::LogError(state) => {
                    error!("[WIFI] Giving up in state {:?}", state);
                }
                _ => {}
            }
        }
    }
}

/// Make sure the network is joined.
///
/// Joins when the supervisor is not past the join step or the network
/// dropped since; otherwise just reports the current state.
pub async fn ensure_connected<N, D>(
    network: &mut N,
    supervisor: &mut LinkSupervisor,
    screen: &mut Screen<D>,
    settings: &JoinSettings<'_>,
) -> Result<ConnectionState, LinkError>
where
    N: NetworkPort,
    D: CharDisplay,
{
    match supervisor.get_current_state() {
        LinkState::Offline | LinkState::Joining => {}
        LinkState::Restarting => return Err(LinkError::NetworkJoinFailed),
        LinkState::SessionConnecting | LinkState::Online => {
            if network.is_joined() {
                return Ok(supervisor.connection_state());
            }
            warn!("[WIFI] Network lost, joining again");
            supervisor.handle_event(LinkEvent::NetworkLost);
        }
    }
    join_network(network, supervisor, screen, settings).await
}

/// Record a failed session attempt and decide what comes next.
///
/// Session attempts are never capped: as long as the network is joined the
/// answer is a fixed delay, with the retry count on the display.
pub fn session_attempt_failed<N, D>(
    network: &mut N,
    supervisor: &mut LinkSupervisor,
    screen: &mut Screen<D>,
    settings: &SessionSettings<'_>,
) -> SessionRetry
where
    N: NetworkPort,
    D: CharDisplay,
{
    supervisor.handle_event(LinkEvent::SessionFailed);
    if !network.is_joined() {
        warn!("[MQTT] Network lost while connecting");
        supervisor.handle_event(LinkEvent::NetworkLost);
        return SessionRetry::Rejoin;
    }

    let mut next = SessionRetry::Rejoin;
    for action in supervisor.update() {
        match action {
            Action::ShowSessionRetry { attempt } => {
                info!("[MQTT] Retry #{} in {} ms", attempt, settings.retry_delay.as_millis());
                screen.render(&Frame::session_retry(settings.broker, attempt));
            }
            Action::OpenSession => next = SessionRetry::After(settings.retry_delay),
            _ => {}
        }
    }
    next
}

/// Check WiFi and the session after an iteration and feed the supervisor
pub fn check_link<N, S>(network: &mut N, session: &S, supervisor: &mut LinkSupervisor) -> LinkHealth
where
    N: NetworkPort,
    S: MessagingPort,
{
    if !network.is_joined() {
        warn!("[WIFI] Network lost");
        supervisor.handle_event(LinkEvent::NetworkLost);
        LinkHealth::Rejoin
    } else if !session.is_connected() {
        supervisor.handle_event(LinkEvent::SessionLost);
        LinkHealth::Reopen
    } else {
        LinkHealth::Healthy
    }
}
