//! # Messages Module
//!
//! Data structures that travel over the radio.
//!
//! - **RadioFrame**: raw fixed-capacity byte buffer handed to / received from the radio
//! - **ReceivedFrame**: an inbound frame with its RSSI and sender address
//! - **BeaconPacket**: the neighbor discovery beacon and its explicit wire codec
//! - **SamplePayload**: the policy-dependent sample section of a beacon

pub mod beacon_packet;
pub mod radio_frame;

pub use beacon_packet::{BeaconPacket, DecodeError, SamplePayload, record_size};
pub use radio_frame::{RadioFrame, ReceivedFrame};
