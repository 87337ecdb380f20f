use super::{CaptureOutcome, MergeOutcome, SampleStore};
use crate::SAMPLE_CAPACITY;
use crate::SamplePayload;
use crate::sample_source::SampleReading;

/// Bounded FIFO of samples with shift-based eviction
///
/// Eviction moves every later element one slot to the left.
pub struct ShiftFifo {
    readings: [u16; SAMPLE_CAPACITY],
    count: usize,
    has_read: bool,
}

impl ShiftFifo {
    pub const fn new() -> Self {
        ShiftFifo {
            readings: [0; SAMPLE_CAPACITY],
            count: 0,
            has_read: false,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Queued samples, oldest first
    pub fn readings(&self) -> &[u16] {
        &self.readings[..self.count]
    }

    /// Most recently queued sample, the one a beacon advertises as current
    pub fn newest(&self) -> Option<u16> {
        self.readings().last().copied()
    }

    /// Removes the oldest sample
    ///
    /// # Returns
    /// `true` if a sample was removed, `false` if the queue was empty
    pub fn evict_oldest(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.readings.copy_within(1..self.count, 0);
        self.count -= 1;
        self.readings[self.count] = 0;
        true
    }

    fn push(&mut self, value: u16) -> CaptureOutcome {
        let outcome = if self.count == SAMPLE_CAPACITY {
            self.evict_oldest();
            CaptureOutcome::DroppedOldest
        } else {
            CaptureOutcome::Stored
        };
        self.readings[self.count] = value;
        self.count += 1;
        outcome
    }
}

impl Default for ShiftFifo {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore for ShiftFifo {
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome {
        match reading {
            SampleReading::NotReady => CaptureOutcome::NotReady,
            SampleReading::Ready(0) => CaptureOutcome::ZeroReading,
            SampleReading::Ready(value) => self.push(value),
        }
    }

    fn mark_for_send(&mut self) -> SamplePayload {
        let has_read = self.has_read;
        self.has_read = false;
        SamplePayload::Queue {
            readings: self.readings,
            count: self.count as u8,
            has_read,
        }
    }

    /// Applies the neighbor's acknowledgement, then takes over the neighbor's
    /// oldest queued sample, which is the one its next acknowledgement will
    /// evict on the neighbor's side.
    ///
    /// At most one sample is taken over per acknowledgement sent: while our
    /// `has_read` is still pending, repeats of the same neighbor sample (the
    /// other beacons of its burst) are refused.
    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome {
        let SamplePayload::Queue {
            readings,
            count,
            has_read: peer_has_read,
        } = payload
        else {
            return MergeOutcome::LayoutMismatch;
        };
        if !accepted {
            return MergeOutcome::WeakLink;
        }

        let evicted = *peer_has_read && self.evict_oldest();

        if *count > 0 && !self.has_read {
            self.push(readings[0]);
            self.has_read = true;
            MergeOutcome::Merged
        } else if evicted {
            MergeOutcome::Acknowledged
        } else if *count > 0 {
            MergeOutcome::AckPending
        } else {
            MergeOutcome::NothingToMerge
        }
    }

    fn reported_readings(&self) -> &[u16] {
        self.readings()
    }
}
