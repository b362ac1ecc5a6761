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

//! Session manager.
//!
//! One tokio task owns the connection state, the transport stream and the
//! line buffer. Callers talk to it through a command channel, so state
//! changes and stream access are serialized on that task. While an open is
//! pending or a stream is live, the task waits on commands and on the
//! open, write and read futures at the same time, with commands polled
//! first; a `stop` therefore drops a pending write or read instead of
//! waiting for it.

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{SessionError, TransportError};
use super::events::{ObserverSet, SessionEvent, SessionObserver, SubscriptionId};
use super::framing::{LineBuffer, LineFraming};
use super::state::{ConnectionState, DeviceTarget};
use crate::transport::{Transport, TransportStream};

/// Default number of bytes requested per transport read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Tunables for a session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub framing: LineFraming,
    pub read_chunk_size: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            framing: LineFraming::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

enum Command {
    Connect {
        target: DeviceTarget,
        done: oneshot::Sender<()>,
    },
    Send {
        bytes: Vec<u8>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Stop {
        done: oneshot::Sender<()>,
    },
}

/// Owns the lifecycle of one logical connection at a time.
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    state: Arc<RwLock<ConnectionState>>,
    observers: Arc<ObserverSet>,
    task: JoinHandle<()>,
}

impl SessionManager {
    /// Create a manager with default options. Must be called inside a tokio runtime.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_options(transport, SessionOptions::default())
    }

    pub fn with_options(transport: Arc<dyn Transport>, options: SessionOptions) -> Self {
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let observers = Arc::new(ObserverSet::new());

        let task = SessionTask {
            transport,
            options,
            state: state.clone(),
            observers: observers.clone(),
            link: Link::Idle,
            disconnect_announced: false,
        };
        let task = tokio::spawn(task.run(command_rx));

        Self {
            commands,
            state,
            observers,
            task,
        }
    }

    /// Start connecting to `target`.
    ///
    /// Returns once observers have seen `Connecting`; the outcome of the
    /// open arrives later as `Connected` or `Failed`.
    pub async fn connect(&self, target: DeviceTarget) -> Result<(), SessionError> {
        let (done, wait) = oneshot::channel();
        self.request(Command::Connect { target, done }).await?;
        wait.await.map_err(|_| SessionError::Shutdown)
    }

    /// Write `bytes` to the live connection.
    ///
    /// Writes are queued in order and resolve once the bytes are flushed.
    /// A write still pending when the connection closes fails with
    /// [`SessionError::Interrupted`].
    pub async fn send(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SessionError> {
        let (reply, wait) = oneshot::channel();
        self.request(Command::Send {
            bytes: bytes.into(),
            reply,
        })
        .await?;
        wait.await.map_err(|_| SessionError::Shutdown)?
    }

    /// Close the connection, if any. Safe to call in every state.
    pub async fn stop(&self) {
        let (done, wait) = oneshot::channel();
        if self.request(Command::Stop { done }).await.is_ok() {
            let _ = wait.await;
        }
    }

    /// Snapshot of the current state.
    pub fn current_state(&self) -> ConnectionState {
        self.state.read().clone()
    }

    pub fn subscribe(&self, observer: Arc<dyn SessionObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Close any connection and wait for the session task to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            error!("Session task ended abnormally: {}", e);
        }
    }

    async fn request(&self, command: Command) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Shutdown)
    }
}

/// What the session task holds for the current target.
enum Link {
    Idle,
    Opening {
        target: DeviceTarget,
        open: BoxFuture<'static, io::Result<Box<dyn TransportStream>>>,
    },
    Open {
        target: DeviceTarget,
        stream: Arc<dyn TransportStream>,
        lines: LineBuffer,
        outbox: Outbox,
    },
}

impl Link {
    fn target(&self) -> Option<&DeviceTarget> {
        match self {
            Link::Idle => None,
            Link::Opening { target, .. } | Link::Open { target, .. } => Some(target),
        }
    }
}

type WriteReply = oneshot::Sender<Result<(), SessionError>>;

type WriteFuture = BoxFuture<'static, (Vec<u8>, io::Result<()>)>;

/// Writes for the live stream: at most one in flight, the rest in order.
#[derive(Default)]
struct Outbox {
    in_flight: Option<(WriteFuture, WriteReply)>,
    queued: VecDeque<(Vec<u8>, WriteReply)>,
}

impl Outbox {
    fn push(&mut self, stream: &Arc<dyn TransportStream>, bytes: Vec<u8>, reply: WriteReply) {
        if self.in_flight.is_some() {
            self.queued.push_back((bytes, reply));
        } else {
            self.in_flight = Some((start_write(stream, bytes), reply));
        }
    }

    /// Take the reply of the finished write and start the next queued one.
    fn finish(&mut self, stream: &Arc<dyn TransportStream>) -> Option<WriteReply> {
        let (_, reply) = self.in_flight.take()?;
        if let Some((bytes, next)) = self.queued.pop_front() {
            self.in_flight = Some((start_write(stream, bytes), next));
        }
        Some(reply)
    }

    /// Resolves when the in-flight write completes; never if there is none.
    async fn written(&mut self) -> (Vec<u8>, io::Result<()>) {
        match &mut self.in_flight {
            Some((write, _)) => write.await,
            None => futures::future::pending().await,
        }
    }

    /// Drop every pending write, failing its sender.
    fn abort(self) {
        let pending = usize::from(self.in_flight.is_some()) + self.queued.len();
        if pending > 0 {
            debug!("Dropping {} pending writes", pending);
        }
        let replies = self
            .in_flight
            .map(|(_, reply)| reply)
            .into_iter()
            .chain(self.queued.into_iter().map(|(_, reply)| reply));
        for reply in replies {
            let _ = reply.send(Err(SessionError::Interrupted));
        }
    }
}

fn start_write(stream: &Arc<dyn TransportStream>, bytes: Vec<u8>) -> WriteFuture {
    let stream = Arc::clone(stream);
    async move {
        let result = stream.write(&bytes).await;
        (bytes, result)
    }
    .boxed()
}

enum Wake {
    Command(Command),
    Opened(io::Result<Box<dyn TransportStream>>),
    Written(Vec<u8>, io::Result<()>),
    Read(io::Result<usize>),
    Shutdown,
}

struct SessionTask {
    transport: Arc<dyn Transport>,
    options: SessionOptions,
    state: Arc<RwLock<ConnectionState>>,
    observers: Arc<ObserverSet>,
    link: Link,
    /// Observers were last told `Disconnected`.
    disconnect_announced: bool,
}

impl SessionTask {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        debug!("Session task started");
        let mut buf = vec![0u8; self.options.read_chunk_size.max(1)];

        loop {
            let wake = match &mut self.link {
                Link::Idle => commands.recv().await.map_or(Wake::Shutdown, Wake::Command),
                Link::Opening { open, .. } => tokio::select! {
                    biased;
                    command = commands.recv() => command.map_or(Wake::Shutdown, Wake::Command),
                    opened = open => Wake::Opened(opened),
                },
                Link::Open { stream, outbox, .. } => tokio::select! {
                    biased;
                    command = commands.recv() => command.map_or(Wake::Shutdown, Wake::Command),
                    (bytes, result) = outbox.written() => Wake::Written(bytes, result),
                    read = stream.read(&mut buf) => Wake::Read(read),
                },
            };

            match wake {
                Wake::Command(command) => self.handle_command(command).await,
                Wake::Opened(opened) => self.on_opened(opened),
                Wake::Written(bytes, result) => self.on_written(bytes, result).await,
                Wake::Read(Ok(0)) => self.lose(&TransportError::Closed).await,
                Wake::Read(Ok(n)) => self.on_data(&buf[..n]),
                Wake::Read(Err(e)) => self.lose(&TransportError::ReadError(e)).await,
                Wake::Shutdown => break,
            }
        }

        if self.link.target().is_some() {
            self.close_link().await;
            self.transition(ConnectionState::Disconnected);
        }
        debug!("Session task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { target, done } => {
                self.connect(target).await;
                let _ = done.send(());
            }
            Command::Send { bytes, reply } => self.write(bytes, reply),
            Command::Stop { done } => {
                self.stop().await;
                let _ = done.send(());
            }
        }
    }

    async fn connect(&mut self, target: DeviceTarget) {
        if let Some(current) = self.link.target().cloned() {
            if current.same_device(&target) {
                info!("Already connecting or connected to {}", current);
                return;
            }
            info!("Switching from {} to {}", current, target);
            self.stop().await;
        }

        info!("Connecting to {}", target);
        let open = self.transport.open(&target);
        self.link = Link::Opening {
            target: target.clone(),
            open,
        };
        self.transition(ConnectionState::Connecting { target });
    }

    async fn stop(&mut self) {
        if self.link.target().is_none() && self.disconnect_announced {
            debug!("Stop requested while disconnected");
            return;
        }
        self.close_link().await;
        self.transition(ConnectionState::Disconnected);
    }

    fn on_opened(&mut self, opened: io::Result<Box<dyn TransportStream>>) {
        let target = match &self.link {
            Link::Opening { target, .. } => target.clone(),
            _ => return,
        };

        match opened {
            Ok(stream) => {
                info!("Connected to {}", target);
                self.link = Link::Open {
                    target: target.clone(),
                    stream: Arc::from(stream),
                    lines: LineBuffer::new(self.options.framing),
                    outbox: Outbox::default(),
                };
                self.transition(ConnectionState::Connected { target });
            }
            Err(e) => {
                let error = TransportError::OpenFailed(e);
                warn!("Connection to {} failed: {}", target, error);
                self.link = Link::Idle;
                self.transition(ConnectionState::Failed {
                    target,
                    reason: error.to_string(),
                });
                self.transition(ConnectionState::Disconnected);
            }
        }
    }

    fn on_data(&mut self, data: &[u8]) {
        let lines = match &mut self.link {
            Link::Open { lines, .. } => lines.push(data),
            _ => return,
        };

        for line in lines {
            debug!("Line read: {}", line);
            self.observers.notify(&SessionEvent::LineRead(line));
        }
    }

    fn write(&mut self, bytes: Vec<u8>, reply: WriteReply) {
        match &mut self.link {
            Link::Open { stream, outbox, .. } => outbox.push(stream, bytes, reply),
            _ => {
                debug!("Send rejected, not connected");
                let _ = reply.send(Err(SessionError::NotConnected));
            }
        }
    }

    async fn on_written(&mut self, bytes: Vec<u8>, result: io::Result<()>) {
        let Link::Open {
            target,
            stream,
            outbox,
            ..
        } = &mut self.link
        else {
            return;
        };
        let Some(reply) = outbox.finish(stream) else {
            return;
        };

        match result {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", bytes.len(), target);
                self.observers.notify(&SessionEvent::BytesWritten(bytes));
                let _ = reply.send(Ok(()));
            }
            Err(e) => {
                let error = TransportError::WriteFailed(e);
                self.lose(&error).await;
                let _ = reply.send(Err(SessionError::WriteFailed(error)));
            }
        }
    }

    /// The live connection broke: close it, report `Lost`, then `Disconnected`.
    async fn lose(&mut self, error: &TransportError) {
        let target = match &self.link {
            Link::Open { target, .. } => target.clone(),
            _ => return,
        };

        warn!("Connection to {} lost: {}", target, error);
        self.close_link().await;
        self.transition(ConnectionState::Lost {
            target,
            reason: error.to_string(),
        });
        self.transition(ConnectionState::Disconnected);
    }

    async fn close_link(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Idle => {}
            Link::Opening { target, .. } => {
                info!("Abandoning connection attempt to {}", target);
            }
            Link::Open {
                target,
                stream,
                lines,
                outbox,
            } => {
                if !lines.is_empty() {
                    debug!("Discarding {} unterminated bytes", lines.pending().len());
                }
                outbox.abort();
                info!("Closing connection to {}", target);
                stream.close().await;
            }
        }
    }

    fn transition(&mut self, state: ConnectionState) {
        info!("Session state: {}", state);
        *self.state.write() = state.clone();
        self.disconnect_announced = state.is_disconnected();
        self.observers.notify(&SessionEvent::StateChanged(state));
    }
}
