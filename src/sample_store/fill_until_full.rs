use super::{CaptureOutcome, MergeOutcome, SampleStore, fill_first_empty, populated_len};
use crate::SAMPLE_CAPACITY;
use crate::SamplePayload;
use crate::sample_source::SampleReading;

/// Zero-sentinel batch buffer
///
/// Captures fill the first empty slot until the batch is complete, after which
/// the batch is frozen. A neighbor's batch is taken over only while every slot
/// is still zero. Once anything is stored, later beacons (even over a stronger
/// link) are refused, yet the caller still runs the transfer report for them.
pub struct FillUntilFull {
    readings: [u16; SAMPLE_CAPACITY],
}

impl FillUntilFull {
    pub const fn new() -> Self {
        FillUntilFull {
            readings: [0; SAMPLE_CAPACITY],
        }
    }

    pub fn is_full(&self) -> bool {
        self.readings.iter().all(|reading| *reading != 0)
    }

    pub fn is_unpopulated(&self) -> bool {
        self.readings.iter().all(|reading| *reading == 0)
    }

    pub fn readings(&self) -> &[u16; SAMPLE_CAPACITY] {
        &self.readings
    }
}

impl Default for FillUntilFull {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore for FillUntilFull {
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome {
        match reading {
            SampleReading::NotReady => CaptureOutcome::NotReady,
            SampleReading::Ready(0) => CaptureOutcome::ZeroReading,
            SampleReading::Ready(value) => fill_first_empty(&mut self.readings, value),
        }
    }

    fn mark_for_send(&mut self) -> SamplePayload {
        SamplePayload::Batch {
            readings: self.readings,
            count: populated_len(&self.readings) as u8,
        }
    }

    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome {
        let SamplePayload::Batch { readings, .. } = payload else {
            return MergeOutcome::LayoutMismatch;
        };
        if !accepted {
            return MergeOutcome::WeakLink;
        }
        if !self.is_unpopulated() {
            return MergeOutcome::AlreadyPopulated;
        }
        self.readings = *readings;
        MergeOutcome::Merged
    }

    fn reported_readings(&self) -> &[u16] {
        &self.readings[..populated_len(&self.readings)]
    }
}
