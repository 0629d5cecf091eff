//! SSH transport implementation using russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, trace, warn};
use russh::client::{self, Handle, KeyboardInteractiveAuthResponse, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, decode_secret_key, load_secret_key};
use russh::{Channel, ChannelMsg, ChannelReadHalf, ChannelWriteHalf};
use secrecy::ExposeSecret;

use super::config::{AuthMethod, HostKeyVerification, SshConfig};
use crate::channel::{ShellReader, ShellWriter};
use crate::error::{ChannelError, Result, TransportError};

/// Keyboard-interactive rounds answered with the password before giving up.
const MAX_KBD_INTERACTIVE_ROUNDS: usize = 3;

/// SSH transport wrapping russh client.
pub struct SshTransport {
    /// The russh session handle.
    session: Handle<SshHandler>,

    /// Configuration used for this connection.
    config: SshConfig,
}

impl SshTransport {
    /// Connect to the SSH server and authenticate.
    pub async fn connect(config: SshConfig) -> Result<Self> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: None,
            ..Default::default()
        });

        let host_key_error: Arc<Mutex<Option<TransportError>>> = Arc::new(Mutex::new(None));

        let handler = SshHandler {
            host: config.host.clone(),
            port: config.port,
            host_key_verification: config.host_key_verification.clone(),
            known_hosts_path: config.known_hosts_path.clone(),
            host_key_error: host_key_error.clone(),
        };

        debug!("connecting to {}", config.socket_addr());

        let mut session = tokio::time::timeout(
            config.timeout,
            client::connect(ssh_config, (config.host.as_str(), config.port), handler),
        )
        .await
        .map_err(|_| TransportError::Timeout(config.timeout))?
        .map_err(|e| {
            // Prefer the detailed host-key error over russh's generic UnknownKey
            match host_key_error.lock().ok().and_then(|mut slot| slot.take()) {
                Some(hk_err) => hk_err,
                None => TransportError::Ssh(e),
            }
        })?;

        tokio::time::timeout(config.timeout, Self::authenticate(&mut session, &config))
            .await
            .map_err(|_| TransportError::Timeout(config.timeout))??;

        Ok(Self { session, config })
    }

    /// Open a PTY channel with an interactive shell on this connection.
    pub async fn open_channel(&self) -> Result<Channel<Msg>> {
        let channel = self
            .session
            .channel_open_session()
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_pty(
                true,
                &self.config.terminal_type,
                self.config.terminal_width,
                self.config.terminal_height,
                0,
                0,
                &[],
            )
            .await
            .map_err(TransportError::Ssh)?;

        channel
            .request_shell(true)
            .await
            .map_err(TransportError::Ssh)?;

        Ok(channel)
    }

    /// Open the interactive shell and hand out its two halves.
    ///
    /// The writer takes ownership of the connection handle, so closing the
    /// writer tears down the whole SSH connection.
    pub async fn into_shell(self) -> Result<(SshReader, SshWriter)> {
        let channel = self.open_channel().await?;
        let (read_half, write_half) = channel.split();

        Ok((
            SshReader { half: read_half },
            SshWriter {
                half: tokio::sync::Mutex::new(write_half),
                session: self.session,
            },
        ))
    }

    /// Authenticate with the server.
    async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
        let success = match &config.auth {
            AuthMethod::None => session
                .authenticate_none(&config.username)
                .await
                .map_err(TransportError::Ssh)?
                .success(),
            AuthMethod::Password(password) => {
                let accepted = session
                    .authenticate_password(&config.username, password.expose_secret())
                    .await
                    .map_err(TransportError::Ssh)?
                    .success();

                if accepted {
                    true
                } else {
                    debug!("password auth rejected, trying keyboard-interactive");
                    Self::keyboard_interactive(session, &config.username, password.expose_secret())
                        .await?
                }
            }
            AuthMethod::PrivateKey { key, passphrase } => {
                let key = decode_secret_key(
                    key.expose_secret(),
                    passphrase.as_ref().map(|p| p.expose_secret()),
                )
                .map_err(|e| TransportError::Key(e.to_string()))?;

                Self::publickey(session, &config.username, key).await?
            }
            AuthMethod::PrivateKeyFile { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_ref().map(|p| p.expose_secret()))
                    .map_err(|e| TransportError::Key(e.to_string()))?;

                Self::publickey(session, &config.username, key).await?
            }
        };

        if !success {
            return Err(TransportError::AuthenticationFailed {
                user: config.username.clone(),
            }
            .into());
        }

        Ok(())
    }

    async fn publickey(
        session: &mut Handle<SshHandler>,
        username: &str,
        key: russh::keys::PrivateKey,
    ) -> Result<bool> {
        // Get the best RSA hash algorithm supported by the server
        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(TransportError::Ssh)?
            .flatten();

        Ok(session
            .authenticate_publickey(username, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
            .await
            .map_err(TransportError::Ssh)?
            .success())
    }

    /// Answer every keyboard-interactive prompt with the password.
    async fn keyboard_interactive(
        session: &mut Handle<SshHandler>,
        username: &str,
        password: &str,
    ) -> Result<bool> {
        let mut response = session
            .authenticate_keyboard_interactive_start(username, None::<String>)
            .await
            .map_err(TransportError::Ssh)?;

        for _ in 0..MAX_KBD_INTERACTIVE_ROUNDS {
            match response {
                KeyboardInteractiveAuthResponse::Success => return Ok(true),
                KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => {
                    let answers = prompts.iter().map(|_| password.to_string()).collect();
                    response = session
                        .authenticate_keyboard_interactive_respond(answers)
                        .await
                        .map_err(TransportError::Ssh)?;
                }
                _ => return Ok(false),
            }
        }

        Ok(matches!(response, KeyboardInteractiveAuthResponse::Success))
    }
}

/// Read half of the shell channel.
pub struct SshReader {
    half: ChannelReadHalf,
}

#[async_trait]
impl ShellReader for SshReader {
    async fn read_chunk(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.half.wait().await {
                Some(ChannelMsg::Data { data }) => return Ok(Some(Bytes::copy_from_slice(&data))),
                Some(ChannelMsg::ExtendedData { data, .. }) => {
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                Some(other) => trace!("ignoring channel message: {:?}", other),
            }
        }
    }
}

/// Write half of the shell channel; owns the SSH connection.
pub struct SshWriter {
    half: tokio::sync::Mutex<ChannelWriteHalf<Msg>>,
    session: Handle<SshHandler>,
}

#[async_trait]
impl ShellWriter for SshWriter {
    async fn write(&self, data: &[u8]) -> Result<()> {
        if self.session.is_closed() {
            return Err(TransportError::Disconnected.into());
        }
        self.half
            .lock()
            .await
            .data(data)
            .await
            .map_err(|e| ChannelError::Write(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.half.lock().await.close().await {
            debug!("channel close: {}", e);
        }
        if !self.session.is_closed() {
            self.session
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await
                .map_err(TransportError::Ssh)?;
        }
        Ok(())
    }

    fn is_alive(&self) -> bool {
        !self.session.is_closed()
    }
}

/// SSH client handler for russh.
struct SshHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Stores a detailed host-key error so connect() can surface it
    /// instead of the generic russh::Error::UnknownKey.
    host_key_error: Arc<Mutex<Option<TransportError>>>,
}

impl SshHandler {
    /// Check the host key against known_hosts.
    ///
    /// Returns `Ok(true)` if matched, `Ok(false)` if host not found,
    /// `Err(TransportError::HostKeyChanged)` if key changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> std::result::Result<bool, TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::check_known_hosts(&self.host, self.port, pubkey)
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(TransportError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(TransportError::KnownHosts(e.to_string())),
        }
    }

    /// Save a new host key to known_hosts.
    fn learn_host_key(&self, pubkey: &PublicKey) -> std::result::Result<(), TransportError> {
        let result = if let Some(ref path) = self.known_hosts_path {
            russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
        } else {
            russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey)
        };

        result.map_err(|e| TransportError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: TransportError) -> bool {
        if let Ok(mut slot) = self.host_key_error.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        match self.host_key_verification {
            HostKeyVerification::Disabled => Ok(true),

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key: {}", e);
                    }
                    Ok(true)
                }
                Err(e) => Ok(self.reject(e)),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => Ok(true),
                Ok(false) => Ok(self.reject(TransportError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                })),
                Err(e) => Ok(self.reject(e)),
            },
        }
    }
}
