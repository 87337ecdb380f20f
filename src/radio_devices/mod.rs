//! Radio device implementations
//!
//! This module contains the radio device implementations a discovery node can
//! run on, plus the link quality gate applied to received frames:
//!
//! - `echo`: Loopback device that hears its own broadcasts, for single-node testing
//! - `simulator`: Device bridged to an external network simulator for multi-node scenarios
//! - `link_quality`: RSSI threshold filter

pub mod link_quality;

#[cfg(feature = "radio-device-echo")]
pub mod echo;

#[cfg(feature = "radio-device-simulator")]
pub mod simulator;

// Re-export the active radio device implementation
#[cfg(feature = "radio-device-echo")]
pub use echo::{RadioDevice, radio_device_task};

#[cfg(feature = "radio-device-simulator")]
pub use simulator::{RadioDevice, radio_device_task};

pub use link_quality::{LinkQualityFilter, RSSI_THRESHOLD};
