//! # Netshell
//!
//! Async interactive SSH shell sessions for Linux hosts and Nokia SR OS
//! (MD-CLI) routers.
//!
//! Netshell keeps a PTY shell open, negotiates a prompt it can recognise
//! reliably, and runs commands one at a time by waiting for that prompt to
//! come back. Output is stripped of terminal control sequences, the command
//! echo and the trailing prompt before it is returned.
//!
//! ## Features
//!
//! - Async SSH connections via russh
//! - Background buffered reader with tail-only prompt search
//! - Linux prompt normalization, batch execution and base64 file upload
//! - SR OS MD-CLI exclusive configuration transactions and rollback
//! - Session registry with labels and age-based expiry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use netshell::{DeviceType, Session, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netshell::Error> {
//!     let config = SessionBuilder::new("192.168.1.10")
//!         .username("admin")
//!         .password("secret")
//!         .device_type(DeviceType::Linux)
//!         .build()?;
//!
//!     let session = Session::connect(config).await?;
//!     let response = session.exec("uname -a", Duration::from_secs(10)).await?;
//!     println!("{}", response.result);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod driver;
pub mod error;
pub mod platform;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use driver::{
    CommandRecord, Device, DeviceProtocol, DeviceType, Response, SessionBuilder, SessionConfig,
};
pub use error::{Error, Result};
pub use platform::{ConfigureResult, OsInfo};
pub use session::{Session, SessionInfo, SessionManager};
pub use transport::{AuthMethod, HostKeyVerification, SshConfig};
