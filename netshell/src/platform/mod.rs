//! Platform definitions and per-family session overlays.
//!
//! Each vendor module contributes the constants of its family (prompt
//! patterns, failure markers, terminal geometry) and the session type
//! that layers family-specific operations over a [`PtyChannel`](crate::channel::PtyChannel).

mod definition;
pub mod vendors;

pub use definition::PlatformDefinition;
pub use vendors::linux::{LinuxSession, OsInfo};
pub use vendors::nokia_sros::{ConfigureResult, SrosSession};

use crate::driver::DeviceType;

/// The platform definition for a device family.
pub fn definition(device_type: DeviceType) -> PlatformDefinition {
    match device_type {
        DeviceType::Linux => vendors::linux::platform(),
        DeviceType::Sros => vendors::nokia_sros::platform(),
    }
}
