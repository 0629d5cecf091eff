//! Error types for netshell.

use std::time::Duration;

use thiserror::Error;

use crate::driver::CommandRecord;

/// Main error type for netshell operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors (prompt synchronization, reads, writes)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Driver-level errors
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// Platform/vendor errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Session registry errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl Error {
    /// Whether this error is a prompt-wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::PatternTimeout { .. })
                | Error::Transport(TransportError::Timeout(_))
        )
    }

    /// Output accumulated before a timeout or a closed channel, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Error::Channel(ChannelError::PatternTimeout { partial, .. })
            | Error::Channel(ChannelError::Closed { partial }) => Some(partial),
            _ => None,
        }
    }
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts and strict checking is enabled
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (prompt matching, PTY reads and writes).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// No prompt appeared before the deadline.
    #[error("Pattern not found within {timeout:?}. Buffer so far:\n{partial}")]
    PatternTimeout { timeout: Duration, partial: String },

    /// The remote side closed the stream or the session was closed.
    #[error("Channel closed. Buffer so far:\n{partial}")]
    Closed { partial: String },

    /// Writing to the channel failed.
    #[error("Channel write failed: {0}")]
    Write(String),
}

/// Driver layer errors (negotiation, device operations).
#[derive(Error, Debug)]
pub enum DriverError {
    /// Session is not connected
    #[error("Session not connected")]
    NotConnected,

    /// The post-connect handshake did not complete
    #[error("Negotiation failed: {message}")]
    NegotiationFailed { message: String },

    /// Operation is not available for this device family
    #[error("Operation '{operation}' is not supported on {device_type} sessions")]
    Unsupported {
        operation: &'static str,
        device_type: String,
    },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Leaving configuration mode failed; the session state is suspect.
    #[error("Failed to leave configuration mode: {reason}")]
    ConfigExitFailed {
        reason: String,
        steps: Vec<CommandRecord>,
    },
}

/// Platform/vendor definition errors.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Device type string not recognized
    #[error("Unknown device type '{name}' (expected 'linux' or 'sros')")]
    UnknownDeviceType { name: String },
}

/// Session registry errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Referenced session id does not exist
    #[error("Session '{0}' not found. Use connect first.")]
    NotFound(String),
}

/// Result type alias using netshell's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_carries_partial_output() {
        let err: Error = ChannelError::PatternTimeout {
            timeout: Duration::from_secs(1),
            partial: "half a line".to_string(),
        }
        .into();

        assert!(err.is_timeout());
        assert_eq!(err.partial_output(), Some("half a line"));
        assert!(err.to_string().contains("half a line"));
    }

    #[test]
    fn test_lookup_error_message() {
        let err: Error = SessionError::NotFound("pe1".to_string()).into();
        assert!(!err.is_timeout());
        assert!(err.partial_output().is_none());
        assert!(err.to_string().contains("'pe1'"));
    }
}
