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

//! Byte-stream transports to remote devices.
//!
//! The session manager only sees [`Transport`] and [`TransportStream`];
//! [`rfcomm::RfcommTransport`] is the BlueZ implementation.

pub mod rfcomm;

use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::session::DeviceTarget;

pub use rfcomm::RfcommTransport;

/// Opens streams to devices.
pub trait Transport: Send + Sync + 'static {
    /// Start opening a stream to `target`.
    ///
    /// The future owns its inputs; dropping it abandons the attempt.
    fn open(&self, target: &DeviceTarget) -> BoxFuture<'static, io::Result<Box<dyn TransportStream>>>;
}

/// An open bidirectional byte stream.
///
/// A read and a write may be pending at the same time, so both take `&self`.
pub trait TransportStream: Send + Sync + 'static {
    /// Read available bytes. `Ok(0)` means the remote closed the stream.
    ///
    /// Must be cancel-safe: dropping the future before it completes must
    /// not lose data.
    fn read<'a>(&'a self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>>;

    /// Write and flush the whole buffer.
    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>>;

    /// Close the stream. Calling it again does nothing.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// [`TransportStream`] over any tokio byte stream.
#[derive(Debug)]
pub struct IoStream<S> {
    reader: Mutex<ReadHalf<S>>,
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
}

impl<S> IoStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(inner: S) -> Self {
        let (reader, writer) = tokio::io::split(inner);
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        }
    }

    pub fn boxed(inner: S) -> Box<dyn TransportStream> {
        Box::new(Self::new(inner))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<S> TransportStream for IoStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn read<'a>(&'a self, buf: &'a mut [u8]) -> BoxFuture<'a, io::Result<usize>> {
        async move {
            if self.is_closed() {
                return Ok(0);
            }
            self.reader.lock().await.read(buf).await
        }
        .boxed()
    }

    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, io::Result<()>> {
        async move {
            if self.is_closed() {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "stream closed"));
            }
            let mut writer = self.writer.lock().await;
            writer.write_all(data).await?;
            writer.flush().await
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            if let Err(e) = self.writer.lock().await.shutdown().await {
                debug!("Stream shutdown error: {}", e);
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_io_stream_roundtrip_over_duplex() {
        let (local, mut remote) = tokio::io::duplex(64);
        let stream = IoStream::new(local);

        stream.write(b"ping\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = remote.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping\n");

        remote.write_all(b"pong\n").await.unwrap();
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"pong\n");
    }

    #[tokio::test]
    async fn test_io_stream_close_is_idempotent() {
        let (local, mut remote) = tokio::io::duplex(64);
        let stream = IoStream::new(local);

        stream.close().await;
        stream.close().await;

        let mut buf = [0u8; 4];
        assert_eq!(remote.read(&mut buf).await.unwrap(), 0);
        assert!(stream.write(b"x").await.is_err());
        assert_eq!(stream.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_io_stream_writes_while_read_pending() {
        let (local, mut remote) = tokio::io::duplex(64);
        let stream = IoStream::new(local);

        let mut buf = [0u8; 16];
        let mut reading = stream.read(&mut buf);
        assert!((&mut reading).now_or_never().is_none());

        stream.write(b"ping\n").await.unwrap();
        let mut echo = [0u8; 16];
        let n = remote.read(&mut echo).await.unwrap();
        assert_eq!(&echo[..n], b"ping\n");

        remote.write_all(b"pong\n").await.unwrap();
        assert_eq!(reading.await.unwrap(), 5);
        assert_eq!(&buf[..5], b"pong\n");
    }
}
