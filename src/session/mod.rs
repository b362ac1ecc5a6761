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

//! Session management for a single remote device.
//!
//! [`SessionManager`] runs the connection state machine, turns the incoming
//! byte stream into lines and fans events out to registered observers.

mod error;
mod events;
mod framing;
mod manager;
mod state;

pub use error::{SessionError, TransportError};
pub use events::{ChannelObserver, ObserverSet, SessionEvent, SessionObserver, SubscriptionId};
pub use framing::{LineBuffer, LineFraming, DEFAULT_DELIMITER, DEFAULT_MAX_LINE_LENGTH};
pub use manager::{SessionManager, SessionOptions, DEFAULT_READ_CHUNK_SIZE};
pub use state::{ConnectionState, DeviceTarget};
