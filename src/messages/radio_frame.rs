//! # Radio Frame Module
//!
//! Raw byte buffer exchanged with the radio device.
//!
//! ## Architecture
//!
//! A `RadioFrame` is the unit handed to the transceiver for broadcast and the
//! unit the transceiver delivers on reception. It carries no interpretation of
//! its bytes; decoding into a beacon is done by `BeaconPacket`.
//!
//! The buffer is fixed size (`RADIO_FRAME_SIZE`) so frames can live in static
//! queues without allocation. `length` marks how many bytes are valid.

use crate::RADIO_FRAME_SIZE;

/// Fixed-capacity frame buffer for radio transmission and reception
///
/// # Public Fields
/// The `data` and `length` fields are public so radio device implementations
/// can fill the buffer in place.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioFrame {
    /// Raw frame data buffer of fixed size
    pub data: [u8; RADIO_FRAME_SIZE],

    /// Number of valid bytes in `data`
    pub length: usize,
}

impl RadioFrame {
    /// Creates an empty frame
    pub const fn new() -> Self {
        RadioFrame {
            data: [0u8; RADIO_FRAME_SIZE],
            length: 0,
        }
    }

    /// Creates a frame holding a copy of `bytes`
    ///
    /// Bytes beyond `RADIO_FRAME_SIZE` are truncated; a radio cannot deliver
    /// more than one frame's worth anyway.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut frame = RadioFrame::new();
        let length = bytes.len().min(RADIO_FRAME_SIZE);
        frame.data[..length].copy_from_slice(&bytes[..length]);
        frame.length = length;
        frame
    }

    /// Returns the valid part of the frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length.min(RADIO_FRAME_SIZE)]
    }
}

impl Default for RadioFrame {
    fn default() -> Self {
        Self::new()
    }
}

/// A frame delivered by the radio together with its reception metadata
///
/// The radio stamps every inbound frame with the measured RSSI and the
/// link-layer address of the transmitter.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ReceivedFrame {
    pub frame: RadioFrame,
    /// Received signal strength in dBm
    pub rssi: i16,
    /// Link-layer address of the transmitting radio
    pub sender_address: u32,
}
