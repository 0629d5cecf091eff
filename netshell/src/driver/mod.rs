//! Device drivers on top of a prompt-synchronized channel.
//!
//! A driver knows how to bring a freshly opened shell into a known state
//! (prompt negotiation) and which higher-level operations a device family
//! supports. [`Device`] is the closed set of families this crate speaks.

mod builder;
pub(crate) mod response;

pub use builder::{SessionBuilder, SessionConfig};
pub use response::{CommandRecord, Response};

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::channel::{PtyChannel, PtyConfig, ShellReader, ShellWriter};
use crate::error::{DriverError, PlatformError, Result};
use crate::platform::{self, LinuxSession, SrosSession};

/// Device family behind a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Generic Linux/Unix shell.
    #[default]
    Linux,
    /// Nokia SR OS with the MD-CLI engine.
    Sros,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Linux => "linux",
            DeviceType::Sros => "sros",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = PlatformError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(DeviceType::Linux),
            "sros" | "nokia_sros" | "nokia-sros" => Ok(DeviceType::Sros),
            _ => Err(PlatformError::UnknownDeviceType {
                name: s.to_string(),
            }),
        }
    }
}

/// Behaviour shared by every device family.
pub trait DeviceProtocol: Send + Sync {
    fn device_type(&self) -> DeviceType;

    /// The channel this driver talks through.
    fn channel(&self) -> &PtyChannel;

    /// Bring a freshly opened shell into a known state.
    fn negotiate(&self) -> impl Future<Output = Result<()>> + Send;

    /// Send a single command and wait for the prompt.
    fn send_command(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Response>> + Send {
        async move { self.channel().send_command(command, timeout).await }
    }

    /// Run a batch under one lock, isolating failures per command.
    ///
    /// A failing command (device error text, timeout) yields a record with
    /// an error and the batch carries on.
    fn send_commands(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<CommandRecord>>> + Send {
        async move {
            if !self.channel().is_connected() {
                return Err(DriverError::NotConnected.into());
            }

            let guard = self.channel().lock().await;
            let mut records = Vec::with_capacity(commands.len());
            for command in commands {
                let record = match guard.send_command(command, timeout).await {
                    Ok(response) => CommandRecord::from_response(response),
                    Err(e) => CommandRecord::failed(command.as_str(), e.to_string()),
                };
                records.push(record);
            }
            Ok(records)
        }
    }
}

/// A negotiated shell for one of the supported device families.
pub enum Device {
    Linux(LinuxSession),
    Sros(SrosSession),
}

impl Device {
    /// Wrap a raw shell channel and negotiate it.
    ///
    /// The channel is torn down if negotiation fails.
    pub async fn open(
        device_type: DeviceType,
        reader: Box<dyn ShellReader>,
        writer: Box<dyn ShellWriter>,
        pty: PtyConfig,
    ) -> Result<Self> {
        let definition = platform::definition(device_type);
        let channel = PtyChannel::open(
            reader,
            writer,
            definition.initial_prompt.clone(),
            definition.failed_when_contains.clone(),
            pty,
        );

        let device = match device_type {
            DeviceType::Linux => Device::Linux(LinuxSession::new(channel, definition)),
            DeviceType::Sros => Device::Sros(SrosSession::new(channel, definition)),
        };

        let negotiated = match &device {
            Device::Linux(linux) => linux.negotiate().await,
            Device::Sros(sros) => sros.negotiate().await,
        };

        if let Err(e) = negotiated {
            debug!("{} negotiation failed: {}", device_type, e);
            if let Err(close_err) = device.channel().close().await {
                debug!("close after failed negotiation: {}", close_err);
            }
            return Err(e);
        }

        info!("{} shell ready", device_type);
        Ok(device)
    }

    pub fn device_type(&self) -> DeviceType {
        match self {
            Device::Linux(_) => DeviceType::Linux,
            Device::Sros(_) => DeviceType::Sros,
        }
    }

    pub fn channel(&self) -> &PtyChannel {
        match self {
            Device::Linux(linux) => linux.channel(),
            Device::Sros(sros) => sros.channel(),
        }
    }

    pub async fn send_command(&self, command: &str, timeout: Duration) -> Result<Response> {
        match self {
            Device::Linux(linux) => linux.send_command(command, timeout).await,
            Device::Sros(sros) => sros.send_command(command, timeout).await,
        }
    }

    pub async fn send_commands(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<CommandRecord>> {
        match self {
            Device::Linux(linux) => linux.send_commands(commands, timeout).await,
            Device::Sros(sros) => sros.send_commands(commands, timeout).await,
        }
    }

    /// The Linux overlay, or an error naming `operation`.
    pub fn linux(&self, operation: &'static str) -> Result<&LinuxSession> {
        match self {
            Device::Linux(linux) => Ok(linux),
            other => Err(other.unsupported(operation)),
        }
    }

    /// The SR OS overlay, or an error naming `operation`.
    pub fn sros(&self, operation: &'static str) -> Result<&SrosSession> {
        match self {
            Device::Sros(sros) => Ok(sros),
            other => Err(other.unsupported(operation)),
        }
    }

    fn unsupported(&self, operation: &'static str) -> crate::Error {
        DriverError::Unsupported {
            operation,
            device_type: self.device_type().to_string(),
        }
        .into()
    }
}
