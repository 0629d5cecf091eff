//! Vendor-specific platforms.

pub mod linux;
pub mod nokia_sros;
