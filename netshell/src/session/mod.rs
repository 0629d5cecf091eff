//! Live sessions and the registry that owns them.
//!
//! A [`Session`] is one negotiated shell plus the connection facts it was
//! opened with. Operations are routed to the device overlay; asking an
//! SR OS session for `os_info` or a Linux session for `configure` is an
//! [`Unsupported`](crate::error::DriverError::Unsupported) error.

mod escape;
mod manager;
mod ops;

pub use escape::decode_escapes;
pub use manager::{DEFAULT_TTL, SessionManager, SessionSummary};
pub use ops::{
    ConnectRequest, ConnectResult, ContextResult, DEFAULT_COMMAND_TIMEOUT, DEFAULT_RAW_WAIT,
    DisconnectResult, ExecResult, RawExchange, RollbackResult, UploadResult,
};

use std::fmt;
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::channel::{PtyConfig, ShellReader, ShellWriter};
use crate::driver::{CommandRecord, Device, DeviceProtocol, DeviceType, Response, SessionConfig};
use crate::error::Result;
use crate::platform::{ConfigureResult, OsInfo};
use crate::transport::SshTransport;

/// Connection facts kept for listing; never includes credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub device_type: DeviceType,
}

/// A negotiated interactive shell.
pub struct Session {
    info: SessionInfo,
    device: Device,
}

impl Session {
    /// Connect over SSH, open a PTY shell and negotiate it.
    ///
    /// The credentials in `config` are dropped once authentication is done.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let SessionConfig {
            ssh,
            device_type,
            pty,
        } = config;

        let info = SessionInfo {
            host: ssh.host.clone(),
            port: ssh.port,
            username: ssh.username.clone(),
            device_type,
        };

        let transport = SshTransport::connect(ssh).await?;
        let (reader, writer) = transport.into_shell().await?;

        Self::open(info, Box::new(reader), Box::new(writer), pty).await
    }

    /// Negotiate a session over an already-open shell channel.
    pub async fn open(
        info: SessionInfo,
        reader: Box<dyn ShellReader>,
        writer: Box<dyn ShellWriter>,
        pty: PtyConfig,
    ) -> Result<Self> {
        let device = Device::open(info.device_type, reader, writer, pty).await?;
        info!(
            "session to {}@{}:{} ready ({})",
            info.username, info.host, info.port, info.device_type
        );
        Ok(Self { info, device })
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_type(&self) -> DeviceType {
        self.info.device_type
    }

    pub fn is_connected(&self) -> bool {
        self.device.channel().is_connected()
    }

    /// Tear down the shell and the connection. Idempotent.
    pub async fn close(&self) -> Result<()> {
        self.device.channel().close().await
    }

    /// Run one command and wait for the prompt.
    pub async fn exec(&self, command: &str, timeout: Duration) -> Result<Response> {
        match &self.device {
            Device::Linux(linux) => linux.exec(command, timeout).await,
            Device::Sros(sros) => sros.send_command(command, timeout).await,
        }
    }

    /// Run commands in order, isolating failures.
    pub async fn exec_multi(
        &self,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<CommandRecord>> {
        match &self.device {
            Device::Linux(linux) => linux.exec_multi(commands, timeout).await,
            Device::Sros(_) => self.device.send_commands(commands, timeout).await,
        }
    }

    /// Write text verbatim and collect whatever comes back within `wait`.
    pub async fn send_raw(&self, text: &str, wait: Duration) -> Result<String> {
        self.device.channel().send_raw(text, wait).await
    }

    pub async fn upload_text(&self, path: &str, content: &str) -> Result<Response> {
        self.device
            .linux("upload_text")?
            .upload_text(path, content)
            .await
    }

    pub async fn os_info(&self) -> Result<OsInfo> {
        self.device.linux("os_info")?.os_info().await
    }

    pub async fn cli(&self, command: &str, timeout: Duration) -> Result<Response> {
        self.device.sros("cli")?.cli(command, timeout).await
    }

    pub async fn configure(&self, commands: &[String], commit: bool) -> Result<ConfigureResult> {
        self.device
            .sros("configure")?
            .configure(commands, commit)
            .await
    }

    pub async fn get_context(&self) -> Result<String> {
        self.device.sros("get_context")?.get_context().await
    }

    pub async fn rollback(&self, index: u32) -> Result<Response> {
        self.device.sros("rollback")?.rollback(index).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::channel::mock::{MockRemote, linux_host, mock_shell};
    use crate::error::{DriverError, Error};

    pub(crate) fn fast_config() -> PtyConfig {
        PtyConfig {
            poll_interval: Duration::from_millis(5),
            read_timeout: Duration::from_millis(10),
            ..PtyConfig::default()
        }
    }

    pub(crate) async fn linux_session(host: &str) -> (Session, MockRemote) {
        let prompt = "user@lab-host:~$ ";
        let (reader, writer, remote) = mock_shell(linux_host(prompt));
        remote.push(prompt);

        let info = SessionInfo {
            host: host.to_string(),
            port: 22,
            username: "user".to_string(),
            device_type: DeviceType::Linux,
        };
        let session = Session::open(info, Box::new(reader), Box::new(writer), fast_config())
            .await
            .unwrap();
        (session, remote)
    }

    #[tokio::test]
    async fn test_linux_session_routes_operations() {
        let (session, _remote) = linux_session("10.0.0.5").await;

        assert!(session.is_connected());
        let response = session.exec("echo routed", Duration::from_secs(1)).await.unwrap();
        assert_eq!(response.result, "routed");
        assert_eq!(session.os_info().await.unwrap().hostname, "lab-host");
    }

    #[tokio::test]
    async fn test_sros_operations_rejected_on_linux() {
        let (session, _remote) = linux_session("10.0.0.5").await;

        let err = session.configure(&[], true).await.unwrap_err();
        match err {
            Error::Driver(DriverError::Unsupported {
                operation,
                device_type,
            }) => {
                assert_eq!(operation, "configure");
                assert_eq!(device_type, "linux");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(session.cli("show version", Duration::from_secs(1)).await.is_err());
        assert!(session.rollback(1).await.is_err());
        assert!(session.get_context().await.is_err());
    }

    #[tokio::test]
    async fn test_debug_shows_connection_facts() {
        let (session, _remote) = linux_session("10.0.0.5").await;

        let debug = format!("{:?}", session);
        assert!(debug.contains("10.0.0.5"));
        assert!(debug.contains("connected: true"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (session, remote) = linux_session("10.0.0.5").await;

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert!(remote.is_closed());
        assert!(!session.is_connected());
        assert!(session.exec("ls", Duration::from_secs(1)).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_negotiation_closes_channel() {
        // The shell never honours the new prompt, so negotiation times out
        let (reader, writer, remote) = mock_shell(|_| None);
        remote.push("login ok\r\n$ ");
        let info = SessionInfo {
            host: "10.0.0.6".to_string(),
            port: 22,
            username: "user".to_string(),
            device_type: DeviceType::Linux,
        };

        let result = Session::open(info, Box::new(reader), Box::new(writer), fast_config()).await;

        assert!(result.unwrap_err().is_timeout());
        assert!(remote.is_closed());
    }
}
