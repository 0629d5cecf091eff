//! Request-level operations on the registry.
//!
//! These are the entry points a tool server exposes: each takes a session
//! id, runs one operation and returns a serializable result.

use std::path::PathBuf;
use std::time::Duration;

use log::info;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{SessionManager, decode_escapes};
use crate::driver::{CommandRecord, DeviceType, SessionBuilder, SessionConfig};
use crate::error::Result;
use crate::platform::{ConfigureResult, OsInfo};
use crate::transport::config::AuthMethod;

/// Default deadline for `exec`, `exec_multi` and `cli`.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Default settle time for `send_raw`.
pub const DEFAULT_RAW_WAIT: Duration = Duration::from_secs(1);

fn default_port() -> u16 {
    22
}

fn default_timeout() -> u64 {
    30
}

/// Parameters for [`SessionManager::connect`].
///
/// Credentials are held as [`SecretString`] and never leave the transport
/// once authentication completes.
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// PEM/OpenSSH-encoded key material.
    #[serde(default)]
    pub private_key: Option<SecretString>,
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<SecretString>,
    #[serde(default)]
    pub device_type: DeviceType,
    /// Connection and authentication timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Label to register the session under instead of a random id.
    #[serde(default)]
    pub label: Option<String>,
}

impl ConnectRequest {
    /// Validate the request into a [`SessionConfig`].
    ///
    /// An in-memory key wins over a key file, which wins over a password.
    pub fn into_config(self) -> Result<SessionConfig> {
        let auth = match (self.private_key, self.key_file, self.password) {
            (Some(key), _, _) => AuthMethod::PrivateKey {
                key,
                passphrase: self.passphrase,
            },
            (None, Some(path), _) => AuthMethod::PrivateKeyFile {
                path,
                passphrase: self.passphrase,
            },
            (None, None, Some(password)) => AuthMethod::Password(password),
            (None, None, None) => AuthMethod::None,
        };

        SessionBuilder::new(self.host)
            .port(self.port)
            .username(self.username)
            .auth(auth)
            .device_type(self.device_type)
            .timeout(Duration::from_secs(self.timeout))
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectResult {
    pub session_id: String,
    pub host: String,
    pub port: u16,
    pub device_type: DeviceType,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisconnectResult {
    pub session_id: String,
    pub status: &'static str,
}

/// Cleaned output of a single command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecResult {
    pub command: String,
    pub output: String,
}

/// What [`SessionManager::send_raw`] wrote and what came back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawExchange {
    /// The decoded input, escaped for display.
    pub sent: String,
    pub received: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub path: String,
    pub bytes: usize,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextResult {
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackResult {
    pub index: u32,
    pub output: String,
}

impl SessionManager {
    /// Open a session from a request and register it.
    pub async fn connect(&self, request: ConnectRequest) -> Result<ConnectResult> {
        let label = request.label.clone();
        let config = request.into_config()?;
        let host = config.ssh.host.clone();
        let port = config.ssh.port;
        let device_type = config.device_type;

        let session_id = self.create_session(config, label).await?;
        info!("connected {} as session {}", host, session_id);

        Ok(ConnectResult {
            session_id,
            host,
            port,
            device_type,
            status: "connected",
        })
    }

    pub async fn disconnect(&self, session_id: &str) -> Result<DisconnectResult> {
        self.close_session(session_id).await?;
        Ok(DisconnectResult {
            session_id: session_id.to_string(),
            status: "disconnected",
        })
    }

    pub async fn exec(
        &self,
        session_id: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecResult> {
        let session = self.get_session(session_id).await?;
        let response = session.exec(command, timeout).await?;
        Ok(ExecResult {
            command: command.to_string(),
            output: response.result,
        })
    }

    pub async fn exec_multi(
        &self,
        session_id: &str,
        commands: &[String],
        timeout: Duration,
    ) -> Result<Vec<CommandRecord>> {
        let session = self.get_session(session_id).await?;
        session.exec_multi(commands, timeout).await
    }

    /// Decode backslash escapes in `text`, write it verbatim and collect
    /// what arrives within `wait`.
    pub async fn send_raw(&self, session_id: &str, text: &str, wait: Duration) -> Result<RawExchange> {
        let session = self.get_session(session_id).await?;
        let decoded = decode_escapes(text);
        let received = session.send_raw(&decoded, wait).await?;
        Ok(RawExchange {
            sent: format!("{:?}", decoded),
            received,
        })
    }

    pub async fn os_info(&self, session_id: &str) -> Result<OsInfo> {
        self.get_session(session_id).await?.os_info().await
    }

    pub async fn upload_text(
        &self,
        session_id: &str,
        path: &str,
        content: &str,
    ) -> Result<UploadResult> {
        let session = self.get_session(session_id).await?;
        let response = session.upload_text(path, content).await?;
        Ok(UploadResult {
            path: path.to_string(),
            bytes: content.len(),
            output: response.result,
        })
    }

    pub async fn cli(&self, session_id: &str, command: &str, timeout: Duration) -> Result<ExecResult> {
        let session = self.get_session(session_id).await?;
        let response = session.cli(command, timeout).await?;
        Ok(ExecResult {
            command: command.to_string(),
            output: response.result,
        })
    }

    pub async fn configure(
        &self,
        session_id: &str,
        commands: &[String],
        commit: bool,
    ) -> Result<ConfigureResult> {
        self.get_session(session_id)
            .await?
            .configure(commands, commit)
            .await
    }

    pub async fn get_context(&self, session_id: &str) -> Result<ContextResult> {
        let context = self.get_session(session_id).await?.get_context().await?;
        Ok(ContextResult { context })
    }

    pub async fn rollback(&self, session_id: &str, index: u32) -> Result<RollbackResult> {
        let response = self.get_session(session_id).await?.rollback(index).await?;
        Ok(RollbackResult {
            index,
            output: response.result,
        })
    }
}
