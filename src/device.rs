//! Combines the broadcast client set and the tunnel probe into the single
//! connectivity value shown to the user.

use serde::Serialize;

use crate::bridge::AdbBridge;

/// Tri-state device connectivity. The serialized forms are the exact
/// strings the display and the UI render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceStatus {
    #[serde(rename = "Connected")]
    Connected,
    #[serde(rename = "Connected (ADB)")]
    ConnectedAdb,
    #[serde(rename = "Not connected")]
    NotConnected,
}

/// A live display channel is proof of connectivity on its own and short-
/// circuits the check; the tunnel listing is only consulted when nothing is
/// attached, since it cannot be trusted everywhere.
pub async fn resolve(clients_attached: bool, bridge: &AdbBridge) -> DeviceStatus {
    if clients_attached {
        return DeviceStatus::Connected;
    }
    if bridge.is_tunnel_active().await {
        DeviceStatus::ConnectedAdb
    } else {
        DeviceStatus::NotConnected
    }
}
