//! Builder for session configurations.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use super::DeviceType;
use crate::channel::PtyConfig;
use crate::error::{DriverError, Result};
use crate::platform;
use crate::transport::config::{AuthMethod, HostKeyVerification, SshConfig};

/// Everything needed to open a session.
#[derive(Debug)]
pub struct SessionConfig {
    pub ssh: SshConfig,
    pub device_type: DeviceType,
    pub pty: PtyConfig,
}

/// Builder for [`SessionConfig`].
///
/// # Example
///
/// ```rust,no_run
/// use netshell::{DeviceType, Session, SessionBuilder};
///
/// # async fn example() -> Result<(), netshell::Error> {
/// let config = SessionBuilder::new("192.168.1.1")
///     .username("admin")
///     .password("secret")
///     .device_type(DeviceType::Sros)
///     .build()?;
/// let session = Session::connect(config).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    port: u16,
    username: Option<String>,
    auth: AuthMethod,
    device_type: DeviceType,
    timeout: Duration,
    terminal_type: String,
    terminal_size: Option<(u32, u32)>,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    pty: PtyConfig,
}

impl SessionBuilder {
    /// Create a new builder for the specified host.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            username: None,
            auth: AuthMethod::None,
            device_type: DeviceType::Linux,
            timeout: Duration::from_secs(30),
            terminal_type: "vt100".to_string(),
            terminal_size: None,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            pty: PtyConfig::default(),
        }
    }

    /// Set the SSH port (default: 22).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set password authentication.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Password(SecretString::from(password.into()));
        self
    }

    /// Authenticate with a PEM/OpenSSH-encoded key held in memory.
    pub fn private_key(mut self, key: impl Into<String>, passphrase: Option<String>) -> Self {
        self.auth = AuthMethod::PrivateKey {
            key: SecretString::from(key.into()),
            passphrase: passphrase.map(SecretString::from),
        };
        self
    }

    /// Authenticate with a private key file.
    pub fn private_key_file(mut self, path: impl Into<PathBuf>, passphrase: Option<String>) -> Self {
        self.auth = AuthMethod::PrivateKeyFile {
            path: path.into(),
            passphrase: passphrase.map(SecretString::from),
        };
        self
    }

    /// Use an already-built authentication method.
    pub fn auth(mut self, auth: AuthMethod) -> Self {
        self.auth = auth;
        self
    }

    /// Set the device family (default: Linux).
    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the connection and authentication timeout (default: 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the terminal type requested for the PTY (default: vt100).
    pub fn terminal_type(mut self, terminal_type: impl Into<String>) -> Self {
        self.terminal_type = terminal_type.into();
        self
    }

    /// Override the platform's terminal dimensions.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_size = Some((width, height));
        self
    }

    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a known_hosts file other than `~/.ssh/known_hosts`.
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Replace all PTY timing and buffer settings at once.
    pub fn pty_config(mut self, pty: PtyConfig) -> Self {
        self.pty = pty;
        self
    }

    /// Set the prompt search depth (default: 1000 bytes).
    pub fn search_depth(mut self, depth: usize) -> Self {
        self.pty.search_depth = depth;
        self
    }

    /// Set how often waiting commands poll the buffer (default: 20ms).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.pty.poll_interval = interval;
        self
    }

    /// Validate and assemble the configuration.
    ///
    /// Nothing is connected yet.
    pub fn build(self) -> Result<SessionConfig> {
        let username = self
            .username
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DriverError::InvalidConfig {
                message: "Username is required".to_string(),
            })?;

        if self.auth.is_none() {
            return Err(DriverError::InvalidConfig {
                message: "Either a password or a private key is required".to_string(),
            }
            .into());
        }

        if self.host.is_empty() {
            return Err(DriverError::InvalidConfig {
                message: "Host is required".to_string(),
            }
            .into());
        }

        let (terminal_width, terminal_height) = self.terminal_size.unwrap_or_else(|| {
            let definition = platform::definition(self.device_type);
            (definition.terminal_width, definition.terminal_height)
        });

        let ssh = SshConfig {
            host: self.host,
            port: self.port,
            username,
            auth: self.auth,
            timeout: self.timeout,
            terminal_type: self.terminal_type,
            terminal_width,
            terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        Ok(SessionConfig {
            ssh,
            device_type: self.device_type,
            pty: self.pty,
        })
    }
}
