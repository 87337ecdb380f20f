//! # Beacon Packet Module
//!
//! The neighbor discovery beacon record and its wire codec.
//!
//! ## Wire Layout
//!
//! Every beacon starts with a 12 byte header, all fields little endian:
//! - Bytes 0-3: Source node ID
//! - Bytes 4-7: Timestamp (sender's local tick counter, truncated to 32 bits)
//! - Bytes 8-11: Sequence number
//!
//! The payload that follows depends on the configured buffer policy:
//! - OverwriteSingle: reading (u16), has_read (u8)
//! - ShiftFifo: readings (SAMPLE_CAPACITY × u16), count (u8), has_read (u8)
//! - FillUntilFull: readings (SAMPLE_CAPACITY × u16), count (u8)
//! - DualBuffer: captured (SAMPLE_CAPACITY × u16), relayed (SAMPLE_CAPACITY × u16), captured count (u8)
//!
//! Boolean fields take one byte; zero is false, anything else is true.
//!
//! A frame whose length differs from the record size of the local policy is
//! not a member of the protocol and is rejected by `from_frame`.

use crate::RadioFrame;
use crate::sample_store::BufferPolicy;
use crate::{BEACON_HEADER_SIZE, RADIO_FRAME_SIZE, SAMPLE_CAPACITY};

/// Reason a frame could not be decoded as a beacon
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DecodeError {
    /// Frame length does not match the record size of the expected policy
    LengthMismatch { expected: usize, actual: usize },
    /// A count field claims more samples than the buffer capacity
    CountOutOfRange(u8),
}

/// Sample payload carried by a beacon, one variant per buffer policy
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum SamplePayload {
    Single {
        reading: u16,
        has_read: bool,
    },
    Queue {
        readings: [u16; SAMPLE_CAPACITY],
        count: u8,
        has_read: bool,
    },
    Batch {
        readings: [u16; SAMPLE_CAPACITY],
        count: u8,
    },
    Dual {
        captured: [u16; SAMPLE_CAPACITY],
        relayed: [u16; SAMPLE_CAPACITY],
        captured_count: u8,
    },
}

impl SamplePayload {
    /// Buffer policy whose wire layout this payload uses
    pub fn policy(&self) -> BufferPolicy {
        match self {
            SamplePayload::Single { .. } => BufferPolicy::OverwriteSingle,
            SamplePayload::Queue { .. } => BufferPolicy::ShiftFifo,
            SamplePayload::Batch { .. } => BufferPolicy::FillUntilFull,
            SamplePayload::Dual { .. } => BufferPolicy::DualBuffer,
        }
    }
}

/// Neighbor discovery beacon
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct BeaconPacket {
    pub source_id: u32,
    pub timestamp: u32,
    pub sequence: u32,
    pub payload: SamplePayload,
}

const SAMPLE_ARRAY_SIZE: usize = SAMPLE_CAPACITY * 2;

/// Returns the exact encoded size of a beacon for the given policy
pub const fn record_size(policy: BufferPolicy) -> usize {
    BEACON_HEADER_SIZE
        + match policy {
            BufferPolicy::OverwriteSingle => 2 + 1,
            BufferPolicy::ShiftFifo => SAMPLE_ARRAY_SIZE + 1 + 1,
            BufferPolicy::FillUntilFull => SAMPLE_ARRAY_SIZE + 1,
            BufferPolicy::DualBuffer => SAMPLE_ARRAY_SIZE * 2 + 1,
        }
}

const _: () = assert!(
    record_size(BufferPolicy::DualBuffer) <= RADIO_FRAME_SIZE,
    "largest beacon record must fit in one radio frame"
);

struct FieldWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> FieldWriter<'a> {
    fn new(buffer: &'a mut [u8]) -> Self {
        FieldWriter { buffer, position: 0 }
    }

    fn put_u8(&mut self, value: u8) {
        self.buffer[self.position] = value;
        self.position += 1;
    }

    fn put_u16(&mut self, value: u16) {
        self.buffer[self.position..self.position + 2].copy_from_slice(&value.to_le_bytes());
        self.position += 2;
    }

    fn put_u32(&mut self, value: u32) {
        self.buffer[self.position..self.position + 4].copy_from_slice(&value.to_le_bytes());
        self.position += 4;
    }

    fn put_readings(&mut self, readings: &[u16; SAMPLE_CAPACITY]) {
        for reading in readings {
            self.put_u16(*reading);
        }
    }
}

// Callers check the total length up front, so the reads below stay in bounds.
struct FieldReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        FieldReader { buffer, position: 0 }
    }

    fn u8(&mut self) -> u8 {
        let value = self.buffer[self.position];
        self.position += 1;
        value
    }

    fn u16(&mut self) -> u16 {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&self.buffer[self.position..self.position + 2]);
        self.position += 2;
        u16::from_le_bytes(bytes)
    }

    fn u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.buffer[self.position..self.position + 4]);
        self.position += 4;
        u32::from_le_bytes(bytes)
    }

    fn readings(&mut self) -> [u16; SAMPLE_CAPACITY] {
        let mut readings = [0u16; SAMPLE_CAPACITY];
        for reading in readings.iter_mut() {
            *reading = self.u16();
        }
        readings
    }

    fn count(&mut self) -> Result<u8, DecodeError> {
        let count = self.u8();
        if count as usize > SAMPLE_CAPACITY {
            return Err(DecodeError::CountOutOfRange(count));
        }
        Ok(count)
    }
}

impl BeaconPacket {
    /// Encoded size of this beacon
    pub fn encoded_len(&self) -> usize {
        record_size(self.payload.policy())
    }

    /// Serializes the beacon into a radio frame
    pub fn to_frame(&self) -> RadioFrame {
        let mut frame = RadioFrame::new();
        let length = self.encoded_len();
        let mut writer = FieldWriter::new(&mut frame.data[..length]);

        writer.put_u32(self.source_id);
        writer.put_u32(self.timestamp);
        writer.put_u32(self.sequence);

        match &self.payload {
            SamplePayload::Single { reading, has_read } => {
                writer.put_u16(*reading);
                writer.put_u8(*has_read as u8);
            }
            SamplePayload::Queue { readings, count, has_read } => {
                writer.put_readings(readings);
                writer.put_u8(*count);
                writer.put_u8(*has_read as u8);
            }
            SamplePayload::Batch { readings, count } => {
                writer.put_readings(readings);
                writer.put_u8(*count);
            }
            SamplePayload::Dual {
                captured,
                relayed,
                captured_count,
            } => {
                writer.put_readings(captured);
                writer.put_readings(relayed);
                writer.put_u8(*captured_count);
            }
        }

        frame.length = length;
        frame
    }

    /// Decodes a beacon from raw bytes using the wire layout of `policy`
    ///
    /// # Returns
    /// * `Ok(packet)` if the length matches the policy's record size and all counts are in range
    /// * `Err(DecodeError)` otherwise
    pub fn from_bytes(bytes: &[u8], policy: BufferPolicy) -> Result<Self, DecodeError> {
        let expected = record_size(policy);
        if bytes.len() != expected {
            return Err(DecodeError::LengthMismatch {
                expected,
                actual: bytes.len(),
            });
        }

        let mut reader = FieldReader::new(bytes);
        let source_id = reader.u32();
        let timestamp = reader.u32();
        let sequence = reader.u32();

        let payload = match policy {
            BufferPolicy::OverwriteSingle => SamplePayload::Single {
                reading: reader.u16(),
                has_read: reader.u8() != 0,
            },
            BufferPolicy::ShiftFifo => SamplePayload::Queue {
                readings: reader.readings(),
                count: reader.count()?,
                has_read: reader.u8() != 0,
            },
            BufferPolicy::FillUntilFull => SamplePayload::Batch {
                readings: reader.readings(),
                count: reader.count()?,
            },
            BufferPolicy::DualBuffer => SamplePayload::Dual {
                captured: reader.readings(),
                relayed: reader.readings(),
                captured_count: reader.count()?,
            },
        };

        Ok(BeaconPacket {
            source_id,
            timestamp,
            sequence,
            payload,
        })
    }

    /// Decodes a beacon from a received radio frame
    pub fn from_frame(frame: &RadioFrame, policy: BufferPolicy) -> Result<Self, DecodeError> {
        Self::from_bytes(frame.as_bytes(), policy)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    fn readings_from(values: &[u16]) -> [u16; SAMPLE_CAPACITY] {
        let mut readings = [0u16; SAMPLE_CAPACITY];
        readings[..values.len()].copy_from_slice(values);
        readings
    }

    #[test]
    fn record_sizes_match_wire_layout() {
        assert_eq!(record_size(BufferPolicy::OverwriteSingle), 15);
        assert_eq!(record_size(BufferPolicy::ShiftFifo), 34);
        assert_eq!(record_size(BufferPolicy::FillUntilFull), 33);
        assert_eq!(record_size(BufferPolicy::DualBuffer), 53);
    }

    #[test]
    fn header_fields_are_little_endian_in_order() {
        let packet = BeaconPacket {
            source_id: 0x0403_0201,
            timestamp: 0x0807_0605,
            sequence: 0x0C0B_0A09,
            payload: SamplePayload::Single {
                reading: 0xBEEF,
                has_read: true,
            },
        };
        let frame = packet.to_frame();
        assert_eq!(frame.length, 15);
        assert_eq!(&frame.data[0..12], &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(&frame.data[12..15], &[0xEF, 0xBE, 1]);
    }

    #[test]
    fn dual_payload_decodes_back() {
        let packet = BeaconPacket {
            source_id: 7,
            timestamp: 123_456,
            sequence: 42,
            payload: SamplePayload::Dual {
                captured: readings_from(&[10, 20, 30]),
                relayed: readings_from(&[99]),
                captured_count: 3,
            },
        };
        let decoded = BeaconPacket::from_frame(&packet.to_frame(), BufferPolicy::DualBuffer).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let packet = BeaconPacket {
            source_id: 1,
            timestamp: 0,
            sequence: 1,
            payload: SamplePayload::Batch {
                readings: readings_from(&[5]),
                count: 1,
            },
        };
        // A batch record is one byte shorter than a queue record
        let result = BeaconPacket::from_frame(&packet.to_frame(), BufferPolicy::ShiftFifo);
        assert_eq!(result, Err(DecodeError::LengthMismatch { expected: 34, actual: 33 }));

        let result = BeaconPacket::from_bytes(&[0u8; 3], BufferPolicy::OverwriteSingle);
        assert!(matches!(result, Err(DecodeError::LengthMismatch { .. })));
    }

    #[test]
    fn count_above_capacity_is_rejected() {
        let mut bytes = [0u8; 33];
        bytes[32] = (SAMPLE_CAPACITY + 1) as u8;
        let result = BeaconPacket::from_bytes(&bytes, BufferPolicy::FillUntilFull);
        assert_eq!(result, Err(DecodeError::CountOutOfRange((SAMPLE_CAPACITY + 1) as u8)));
    }

    #[test]
    fn any_non_zero_flag_byte_reads_as_true() {
        let mut bytes = [0u8; 15];
        bytes[14] = 0x80;
        let packet = BeaconPacket::from_bytes(&bytes, BufferPolicy::OverwriteSingle).unwrap();
        assert_eq!(
            packet.payload,
            SamplePayload::Single {
                reading: 0,
                has_read: true
            }
        );
    }
}
