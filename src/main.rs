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

//! Bluetooth Viewer terminal front end.
//!
//! Usage: bluetooth-viewer [list | connect <ADDRESS> [NAME]]

use anyhow::{bail, Result};
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bluetooth_viewer::config::Config;
use bluetooth_viewer::session::{DeviceTarget, SessionError, SessionEvent, SessionManager};
use bluetooth_viewer::transport::RfcommTransport;
use bluetooth_viewer::viewer::{ViewerState, WRITTEN_PREFIX};

const USAGE: &str = "Usage: bluetooth-viewer [list | connect <ADDRESS> [NAME]]";

const HELP: &str = "-- Commands: /connect <ADDRESS> [NAME], /disconnect, /pause, /play, /status, /quit";

enum Mode {
    List,
    Connect(Option<DeviceTarget>),
    Help,
}

fn parse_target<'a>(mut parts: impl Iterator<Item = &'a str>) -> Option<DeviceTarget> {
    let id = parts.next()?;
    let name = parts.collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        Some(DeviceTarget::from_id(id))
    } else {
        Some(DeviceTarget::new(id, name))
    }
}

fn parse_args(args: &[String], config: &Config) -> Result<Mode> {
    let mut args = args.iter().map(String::as_str);
    match args.next() {
        None => Ok(Mode::Connect(config.bluetooth.default_target())),
        Some("list") => Ok(Mode::List),
        Some("connect") => match parse_target(args) {
            Some(target) => Ok(Mode::Connect(Some(target))),
            None => bail!("connect needs a device address\n{}", USAGE),
        },
        Some("help" | "-h" | "--help") => Ok(Mode::Help),
        Some(other) => bail!("unknown argument '{}'\n{}", other, USAGE),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, stdout is reserved for the conversation
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("bluetooth_viewer=info".parse()?))
        .init();

    info!("Starting Bluetooth Viewer v{}...", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let args: Vec<String> = env::args().skip(1).collect();

    let initial = match parse_args(&args, &config)? {
        Mode::Help => {
            println!("{}", USAGE);
            return Ok(());
        }
        Mode::List => {
            let transport = RfcommTransport::new(&config.bluetooth).await?;
            let devices = transport.paired_devices().await?;
            if devices.is_empty() {
                println!("No paired devices");
            }
            for device in devices {
                println!("{}\t{}", device.id, device.name);
            }
            return Ok(());
        }
        Mode::Connect(target) => target,
    };

    let transport = Arc::new(RfcommTransport::new(&config.bluetooth).await?);
    let manager = SessionManager::with_options(transport, config.session.to_options());

    let viewer = ViewerState::new(&config.viewer);
    for entry in viewer.log_tail(viewer.log_len()) {
        println!("{}", entry.display_text());
    }
    manager.subscribe(viewer.clone());

    let printer = viewer.clone();
    manager.subscribe(Arc::new(move |event: &SessionEvent| match event {
        SessionEvent::StateChanged(state) => match state.reason() {
            Some(reason) => println!("-- {}: {}", state.as_str(), reason),
            None => println!("-- {}", printer.status_text()),
        },
        SessionEvent::LineRead(line) => {
            if !printer.is_paused() {
                println!("{}", line);
            }
        }
        SessionEvent::BytesWritten(bytes) => {
            let written = String::from_utf8_lossy(bytes);
            println!("{}{}", WRITTEN_PREFIX, written.trim_end_matches('\n'));
        }
    }));

    match initial {
        Some(target) => manager.connect(target).await?,
        None => println!("{}", HELP),
    }

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = input.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_input(&line, &manager, &viewer).await? {
                        info!("Quit requested");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.shutdown().await;
    info!("Bluetooth Viewer stopped");
    Ok(())
}

/// Handle one line of user input. Returns `false` when the user quits.
async fn handle_input(line: &str, manager: &SessionManager, viewer: &ViewerState) -> Result<bool> {
    let line = line.trim_end_matches('\r');

    if let Some(command) = line.strip_prefix('/') {
        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("quit") => return Ok(false),
            Some("pause") => viewer.pause(),
            Some("play") => viewer.resume(),
            Some("disconnect") => manager.stop().await,
            Some("connect") => match parse_target(parts) {
                Some(target) => manager.connect(target).await?,
                None => println!("-- /connect needs a device address"),
            },
            Some("status") => println!("-- {}", viewer.status_text()),
            _ => println!("{}", HELP),
        }
        return Ok(true);
    }

    let Some(message) = ViewerState::compose_message(line) else {
        return Ok(true);
    };

    match manager.send(message).await {
        Ok(()) => {}
        Err(SessionError::NotConnected) => println!("-- Not connected"),
        Err(SessionError::Interrupted) => println!("-- Not sent, connection closed"),
        Err(e) => warn!("Send failed: {}", e),
    }
    Ok(true)
}
