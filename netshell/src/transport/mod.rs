//! SSH transport layer wrapping russh.
//!
//! This module provides the low-level SSH connection management,
//! handling connection setup, authentication, and the PTY shell channel.
//! The rest of the crate only sees the [`ShellReader`](crate::channel::ShellReader)
//! and [`ShellWriter`](crate::channel::ShellWriter) halves it produces.

pub mod config;
mod ssh;

pub use config::{AuthMethod, HostKeyVerification, SshConfig};
pub use ssh::{SshReader, SshTransport, SshWriter};
