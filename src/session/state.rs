// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Connection state and device identity.

use std::fmt;

/// A remote device a session can be opened to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTarget {
    /// Opaque identifier understood by the transport (a Bluetooth address for RFCOMM).
    pub id: String,
    /// Human-readable name.
    pub name: String,
}

impl DeviceTarget {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Target whose display name is its identifier.
    pub fn from_id(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
        }
    }

    /// Whether both targets address the same device.
    pub fn same_device(&self, other: &DeviceTarget) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.id {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.name, self.id)
        }
    }
}

/// State of the session's single logical connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport, nothing in progress.
    #[default]
    Disconnected,
    /// Transport open requested.
    Connecting { target: DeviceTarget },
    /// Transport open, read loop running.
    Connected { target: DeviceTarget },
    /// The open attempt failed.
    Failed { target: DeviceTarget, reason: String },
    /// An established connection broke.
    Lost { target: DeviceTarget, reason: String },
}

impl ConnectionState {
    /// The device this state refers to, if any.
    pub fn target(&self) -> Option<&DeviceTarget> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Connecting { target }
            | ConnectionState::Connected { target }
            | ConnectionState::Failed { target, .. }
            | ConnectionState::Lost { target, .. } => Some(target),
        }
    }

    /// Failure reason for `Failed` and `Lost`.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ConnectionState::Failed { reason, .. } | ConnectionState::Lost { reason, .. } => {
                Some(reason)
            }
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Connecting or connected, i.e. a transport is held or being opened.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting { .. } | ConnectionState::Connected { .. }
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting { .. } => "Connecting...",
            ConnectionState::Connected { .. } => "Connected",
            ConnectionState::Failed { .. } => "Connection failed",
            ConnectionState::Lost { .. } => "Connection lost",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.target(), self.reason()) {
            (Some(target), Some(reason)) => write!(f, "{} {}: {}", self.as_str(), target, reason),
            (Some(target), None) => write!(f, "{} {}", self.as_str(), target),
            _ => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_has_no_target() {
        let state = ConnectionState::default();
        assert!(state.is_disconnected());
        assert!(state.target().is_none());
        assert!(state.reason().is_none());
    }

    #[test]
    fn test_failed_carries_target_and_reason() {
        let target = DeviceTarget::new("00:11:22:33:44:55", "HC-05");
        let state = ConnectionState::Failed {
            target: target.clone(),
            reason: "host is down".to_string(),
        };
        assert_eq!(state.target(), Some(&target));
        assert_eq!(state.reason(), Some("host is down"));
        assert!(!state.is_active());
        assert_eq!(
            state.to_string(),
            "Connection failed HC-05 (00:11:22:33:44:55): host is down"
        );
    }

    #[test]
    fn test_same_device_ignores_name() {
        let a = DeviceTarget::new("00:11:22:33:44:55", "HC-05");
        let b = DeviceTarget::from_id("00:11:22:33:44:55");
        assert!(a.same_device(&b));
        assert_ne!(a, b);
        assert_eq!(b.to_string(), "00:11:22:33:44:55");
    }
}
