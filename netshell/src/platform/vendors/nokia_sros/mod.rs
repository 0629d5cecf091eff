//! Nokia SR OS platform support (MD-CLI).

pub mod config_session;
mod platform;
mod session;

pub use config_session::ConfigureResult;
pub use platform::{PLATFORM_NAME, platform};
pub use session::SrosSession;
