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

//! Session error types.

use std::io;
use thiserror::Error;

/// Errors returned to callers of the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live connection to write to.
    #[error("Not connected")]
    NotConnected,

    /// The transport rejected a write; the session is now lost.
    #[error(transparent)]
    WriteFailed(TransportError),

    /// The connection closed before a queued or in-flight write finished.
    #[error("Connection closed before the write completed")]
    Interrupted,

    /// The session task is gone.
    #[error("Session manager has shut down")]
    Shutdown,
}

/// Transport failures, recovered into state transitions.
///
/// The display text becomes the `reason` of `Failed` and `Lost` states.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport open failed: {0}")]
    OpenFailed(#[source] io::Error),

    #[error("Transport read error: {0}")]
    ReadError(#[source] io::Error),

    #[error("Transport closed by remote")]
    Closed,

    #[error("Transport write failed: {0}")]
    WriteFailed(#[source] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_connected_display() {
        assert_eq!(SessionError::NotConnected.to_string(), "Not connected");
        assert_eq!(
            SessionError::Interrupted.to_string(),
            "Connection closed before the write completed"
        );
    }

    #[test]
    fn test_write_failed_shows_transport_reason() {
        let err = SessionError::WriteFailed(TransportError::WriteFailed(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "broken pipe",
        )));
        assert_eq!(err.to_string(), "Transport write failed: broken pipe");
    }

    #[test]
    fn test_transport_error_reason() {
        let err = TransportError::OpenFailed(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(err.to_string(), "Transport open failed: refused");
        assert_eq!(TransportError::Closed.to_string(), "Transport closed by remote");
    }
}
