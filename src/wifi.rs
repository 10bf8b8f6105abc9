//! WiFi module for ESP32-C3 board
//!
//! Station join using esp-wifi 0.14.1 with embassy-net DHCP

use crate::NodeError;
use crate::link::NetworkPort;
use embassy_net::Stack;
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController};
use log::{info, warn};

/// WiFi manager for the station interface
pub struct WiFiManager<'a> {
    controller: WifiController<'a>,
    stack: Stack<'a>,
    was_joined: bool,
}

impl<'a> WiFiManager<'a> {
    /// Create a new WiFi manager instance
    pub fn new(controller: WifiController<'a>, stack: Stack<'a>) -> Self {
        Self {
            controller,
            stack,
            was_joined: false,
        }
    }

    /// Print the DHCP lease
    pub fn log_dhcp_info(&self) {
        match self.stack.config_v4() {
            Some(config) => {
                info!("[DHCP] Address: {}", config.address);
                if let Some(gateway) = config.gateway {
                    info!("[DHCP] Gateway: {}", gateway);
                }
                for (i, dns) in config.dns_servers.iter().enumerate() {
                    info!("[DHCP] DNS server {}: {}", i + 1, dns);
                }
            }
            None => info!("[DHCP] No DHCP configuration available"),
        }
    }
}

impl NetworkPort for WiFiManager<'_> {
    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), NodeError> {
        info!("[WIFI] Connecting to WiFi network: {}", ssid);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client_config = ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| NodeError::WiFiError)?,
            password: password.try_into().map_err(|_| NodeError::WiFiError)?,
            auth_method,
            ..Default::default()
        };

        self.controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| NodeError::WiFiError)?;

        if !self.controller.is_started().unwrap_or(false) {
            self.controller.start().map_err(|_| NodeError::WiFiError)?;
        }
        self.controller.connect().map_err(|e| {
            warn!("[WIFI] Connect request failed: {:?}", e);
            NodeError::WiFiError
        })
    }

    fn is_joined(&mut self) -> bool {
        let joined = self.controller.is_connected().unwrap_or(false) && self.stack.is_config_up();

        if self.was_joined && !joined {
            warn!("[WIFI] WiFi connection lost!");
        } else if !self.was_joined && joined {
            self.log_dhcp_info();
        }
        self.was_joined = joined;

        joined
    }

    fn local_address(&self) -> Option<[u8; 4]> {
        self.stack
            .config_v4()
            .map(|config| config.address.address().octets())
    }
}
