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

//! Bluetooth RFCOMM client transport.

use anyhow::Result;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::str::FromStr;
use tracing::{debug, info};

use super::{IoStream, Transport, TransportStream};
use crate::config::BluetoothConfig;
use crate::session::DeviceTarget;

/// Default RFCOMM channel used by serial port profile devices.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Opens RFCOMM streams through the default BlueZ adapter.
pub struct RfcommTransport {
    adapter: bluer::Adapter,
    channel: u8,
}

impl RfcommTransport {
    /// Connect to BlueZ and prepare the default adapter.
    pub async fn new(config: &BluetoothConfig) -> Result<Self> {
        // Create BlueZ session
        let session = bluer::Session::new().await?;
        debug!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if config.power_on_adapter && !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self {
            adapter,
            channel: config.channel,
        })
    }

    /// Get paired devices.
    pub async fn paired_devices(&self) -> Result<Vec<DeviceTarget>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(DeviceTarget::new(addr.to_string(), name));
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }
}

/// Parse a device id as a Bluetooth address.
pub fn parse_address(id: &str) -> io::Result<Address> {
    Address::from_str(id.trim()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid Bluetooth address '{}': {}", id, e),
        )
    })
}

impl Transport for RfcommTransport {
    fn open(&self, target: &DeviceTarget) -> BoxFuture<'static, io::Result<Box<dyn TransportStream>>> {
        let channel = self.channel;
        let id = target.id.clone();

        async move {
            let address = parse_address(&id)?;
            info!("Opening RFCOMM stream to {} on channel {}", address, channel);
            let stream = Stream::connect(SocketAddr::new(address, channel)).await?;
            debug!("RFCOMM stream to {} established", address);
            Ok(IoStream::boxed(stream))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        let address = parse_address("00:1A:7D:DA:71:13").unwrap();
        assert_eq!(address.to_string(), "00:1A:7D:DA:71:13");
    }

    #[test]
    fn test_parse_address_rejects_garbage() {
        let err = parse_address("not-an-address").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
