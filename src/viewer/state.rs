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

//! Viewer state derived from session events.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use super::log::{ConversationLog, EntryKind, LogEntry};
use crate::config::ViewerConfig;
use crate::session::{ConnectionState, SessionEvent, SessionObserver};

/// Which controls a front end should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub connect: bool,
    pub disconnect: bool,
    pub send: bool,
    pub pause: bool,
    pub play: bool,
}

/// Observer keeping the conversation log and the paused flag.
///
/// The connection state is mirrored from events only; `paused` belongs to
/// the viewer and never reaches the session.
#[derive(Debug)]
pub struct ViewerState {
    connection: RwLock<ConnectionState>,
    paused: RwLock<bool>,
    log: RwLock<ConversationLog>,
}

impl ViewerState {
    pub fn new(config: &ViewerConfig) -> Arc<Self> {
        let log = if config.show_welcome {
            ConversationLog::with_welcome(config.max_log_lines)
        } else {
            ConversationLog::new(config.max_log_lines)
        };
        Arc::new(Self {
            connection: RwLock::new(ConnectionState::Disconnected),
            paused: RwLock::new(false),
            log: RwLock::new(log),
        })
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection.read().clone()
    }

    pub fn status_text(&self) -> String {
        match &*self.connection.read() {
            ConnectionState::Connected { target } => format!("Connected to {}", target.name),
            ConnectionState::Connecting { target } => format!("Connecting to {}...", target.name),
            _ => "Not connected".to_string(),
        }
    }

    pub fn controls(&self) -> Controls {
        let connected = self.connection.read().is_connected();
        let paused = self.is_paused();
        Controls {
            connect: !connected,
            disconnect: connected,
            send: connected,
            pause: connected && !paused,
            play: connected && paused,
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.read()
    }

    /// Stop showing received lines until `resume` or the next state change.
    ///
    /// Allowed in every state; [`Controls`] only offer it while connected.
    pub fn pause(&self) {
        *self.paused.write() = true;
        info!("Line display paused");
    }

    pub fn resume(&self) {
        *self.paused.write() = false;
        info!("Line display resumed");
    }

    /// Bytes to send for typed `text`: the text plus a newline, nothing for empty input.
    pub fn compose_message(text: &str) -> Option<Vec<u8>> {
        if text.is_empty() {
            return None;
        }
        let mut message = String::with_capacity(text.len() + 1);
        message.push_str(text);
        message.push('\n');
        Some(message.into_bytes())
    }

    /// Add an informational line to the log.
    pub fn note(&self, text: impl Into<String>) {
        self.log.write().push(EntryKind::Info, text);
    }

    pub fn log_tail(&self, count: usize) -> Vec<LogEntry> {
        self.log.read().tail(count)
    }

    pub fn log_len(&self) -> usize {
        self.log.read().len()
    }
}

impl SessionObserver for ViewerState {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::StateChanged(state) => {
                *self.connection.write() = state.clone();
                // Any state change resumes the display.
                *self.paused.write() = false;
            }
            SessionEvent::LineRead(line) => {
                if self.is_paused() {
                    debug!("Paused, dropping line");
                    return;
                }
                self.log.write().push(EntryKind::Received, line.clone());
            }
            SessionEvent::BytesWritten(bytes) => {
                let written = String::from_utf8_lossy(bytes);
                let written = written.strip_suffix('\n').unwrap_or(&written);
                debug!("written = '{}'", written);
                self.log.write().push(EntryKind::Sent, written);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::DeviceTarget;

    fn viewer() -> Arc<ViewerState> {
        ViewerState::new(&ViewerConfig {
            max_log_lines: 50,
            show_welcome: false,
        })
    }

    fn connected() -> SessionEvent {
        SessionEvent::StateChanged(ConnectionState::Connected {
            target: DeviceTarget::new("00:1A:7D:DA:71:13", "HC-05"),
        })
    }

    #[test]
    fn test_status_text_follows_state() {
        let viewer = viewer();
        assert_eq!(viewer.status_text(), "Not connected");

        viewer.on_event(&SessionEvent::StateChanged(ConnectionState::Connecting {
            target: DeviceTarget::new("00:1A:7D:DA:71:13", "HC-05"),
        }));
        assert_eq!(viewer.status_text(), "Connecting to HC-05...");

        viewer.on_event(&connected());
        assert_eq!(viewer.status_text(), "Connected to HC-05");

        viewer.on_event(&SessionEvent::StateChanged(ConnectionState::Lost {
            target: DeviceTarget::new("00:1A:7D:DA:71:13", "HC-05"),
            reason: "Transport closed by remote".to_string(),
        }));
        assert_eq!(viewer.status_text(), "Not connected");
    }

    #[test]
    fn test_controls() {
        let viewer = viewer();
        assert_eq!(
            viewer.controls(),
            Controls {
                connect: true,
                ..Controls::default()
            }
        );

        viewer.on_event(&connected());
        assert_eq!(
            viewer.controls(),
            Controls {
                disconnect: true,
                send: true,
                pause: true,
                ..Controls::default()
            }
        );

        viewer.pause();
        assert_eq!(
            viewer.controls(),
            Controls {
                disconnect: true,
                send: true,
                play: true,
                ..Controls::default()
            }
        );
    }

    #[test]
    fn test_pause_while_disconnected() {
        let viewer = viewer();
        viewer.pause();
        assert!(viewer.is_paused());
        assert_eq!(
            viewer.controls(),
            Controls {
                connect: true,
                ..Controls::default()
            }
        );

        viewer.on_event(&connected());
        assert!(!viewer.is_paused());
    }

    #[test]
    fn test_paused_lines_are_dropped() {
        let viewer = viewer();
        viewer.on_event(&connected());

        viewer.on_event(&SessionEvent::LineRead("one".to_string()));
        viewer.pause();
        viewer.on_event(&SessionEvent::LineRead("two".to_string()));
        viewer.resume();
        viewer.on_event(&SessionEvent::LineRead("three".to_string()));

        let texts: Vec<_> = viewer.log_tail(10).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["one", "three"]);
    }

    #[test]
    fn test_state_change_clears_pause() {
        let viewer = viewer();
        viewer.on_event(&connected());
        viewer.pause();

        viewer.on_event(&SessionEvent::StateChanged(ConnectionState::Disconnected));
        assert!(!viewer.is_paused());
    }

    #[test]
    fn test_written_bytes_are_logged_while_paused() {
        let viewer = viewer();
        viewer.on_event(&connected());
        viewer.pause();
        viewer.on_event(&SessionEvent::BytesWritten(b"hi\n".to_vec()));

        let entries = viewer.log_tail(1);
        assert_eq!(entries[0].display_text(), ">>> hi");
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_written_payload_stays_out_of_info_log() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let viewer = viewer();
        tracing::subscriber::with_default(subscriber, || {
            viewer.on_event(&connected());
            viewer.pause();
            viewer.on_event(&SessionEvent::BytesWritten(b"pin=1234\n".to_vec()));
        });

        let output = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert!(output.contains("Line display paused"), "output: {}", output);
        assert!(!output.contains("pin=1234"), "output: {}", output);
    }

    #[test]
    fn test_compose_message() {
        assert_eq!(ViewerState::compose_message(""), None);
        assert_eq!(ViewerState::compose_message("hi"), Some(b"hi\n".to_vec()));
    }
}
