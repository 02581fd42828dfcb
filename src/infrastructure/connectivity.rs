use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    Wifi,
    Cellular,
    Ethernet,
    Bluetooth,
    Vpn,
    Other,
    None,
    Unknown,
}

impl TransportType {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "wifi" => Self::Wifi,
            "cellular" => Self::Cellular,
            "ethernet" => Self::Ethernet,
            "bluetooth" => Self::Bluetooth,
            "vpn" => Self::Vpn,
            "other" | "wimax" => Self::Other,
            "none" => Self::None,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub is_internet_reachable: bool,
    pub transport_type: TransportType,
}

impl ConnectivityState {
    pub fn is_online(&self) -> bool {
        self.is_connected && self.is_internet_reachable
    }
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            is_connected: true,
            is_internet_reachable: true,
            transport_type: TransportType::Unknown,
        }
    }
}

/// Process-wide reachability state. `update` is the only writer and is
/// meant to be driven by the platform's network-change listener.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    sender: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(initial: ConnectivityState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Returns true when the online gate flipped.
    pub fn update(&self, state: ConnectivityState) -> bool {
        let was_online = self.sender.borrow().is_online();
        self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        was_online != state.is_online()
    }

    pub fn current(&self) -> ConnectivityState {
        *self.sender.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.sender.subscribe()
    }

    pub fn gate(&self) -> ConnectivityGate {
        ConnectivityGate {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(ConnectivityState::default())
    }
}

/// Read-only view consulted before network work.
#[derive(Debug, Clone)]
pub struct ConnectivityGate {
    receiver: watch::Receiver<ConnectivityState>,
}

impl ConnectivityGate {
    pub fn is_online(&self) -> bool {
        self.receiver.borrow().is_online()
    }

    /// A gate that never closes, for callers without a monitor.
    pub fn always_online() -> Self {
        let (sender, receiver) = watch::channel(ConnectivityState::default());
        // The receiver keeps the last value after the sender is dropped.
        drop(sender);
        Self { receiver }
    }
}
