//! Port snapshots: descriptive attributes of one discovered input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the port is open for reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortConnection {
    Pending,
    Open,
    Closed,
}

/// Whether the device is plugged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Connected,
    Disconnected,
}

impl fmt::Display for PortConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortConnection::Pending => "pending",
            PortConnection::Open => "open",
            PortConnection::Closed => "closed",
        })
    }
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortState::Connected => "connected",
            PortState::Disconnected => "disconnected",
        })
    }
}

/// One input as published in the `_inputs` attribute.
///
/// Snapshots are replaced wholesale on every topology change, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub id: String,
    pub name: String,
    pub manufacturer: String,
    pub connection: PortConnection,
    pub state: PortState,
}

impl PortSnapshot {
    /// A connected, open input.
    pub fn connected(
        id: impl Into<String>,
        name: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            manufacturer: manufacturer.into(),
            connection: PortConnection::Open,
            state: PortState::Connected,
        }
    }

    pub fn with_state(mut self, connection: PortConnection, state: PortState) -> Self {
        self.connection = connection;
        self.state = state;
        self
    }

    /// Field lines indented by `indent` spaces, one per attribute.
    pub fn describe(&self, indent: usize) -> String {
        let pad = " ".repeat(indent);
        format!(
            "{pad}id: {}\n{pad}name: {}\n{pad}manufacturer: {}\n{pad}connection: {}\n{pad}state: {}",
            self.id, self.name, self.manufacturer, self.connection, self.state
        )
    }
}
