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

//! Scroll-back log of the conversation with the device.

use std::collections::VecDeque;

/// Prefix marking lines we sent.
pub const WRITTEN_PREFIX: &str = ">>> ";

/// Lines shown before anything is received.
pub const WELCOME_LINES: [&str; 4] = [
    "Welcome to Bluetooth Viewer.",
    "Connect to a paired device to see the lines it sends.",
    "Type text and press enter to send it, followed by a newline.",
    "Pause stops new lines from being shown; the connection stays open.",
];

/// Origin of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Info,
    Received,
    Sent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub text: String,
}

impl LogEntry {
    /// Text as displayed, sent lines carry [`WRITTEN_PREFIX`].
    pub fn display_text(&self) -> String {
        match self.kind {
            EntryKind::Sent => format!("{}{}", WRITTEN_PREFIX, self.text),
            _ => self.text.clone(),
        }
    }
}

/// Bounded log; the oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl ConversationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Log pre-filled with [`WELCOME_LINES`].
    pub fn with_welcome(capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        for line in WELCOME_LINES {
            log.push(EntryKind::Info, line);
        }
        log
    }

    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            kind,
            text: text.into(),
        });
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// The newest `count` entries, oldest first.
    pub fn tail(&self, count: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
