use super::{CaptureOutcome, MergeOutcome, SampleStore, fill_first_empty, populated_len};
use crate::SAMPLE_CAPACITY;
use crate::SamplePayload;
use crate::sample_source::SampleReading;

/// Separate capture and relay buffers
///
/// `mine` only ever holds local captures; `theirs` only ever holds the most
/// recent accepted neighbor batch. The neighbor's own relay section is not
/// taken over, so samples travel at most one hop.
pub struct DualBuffer {
    mine: [u16; SAMPLE_CAPACITY],
    theirs: [u16; SAMPLE_CAPACITY],
    received_count: usize,
}

impl DualBuffer {
    pub const fn new() -> Self {
        DualBuffer {
            mine: [0; SAMPLE_CAPACITY],
            theirs: [0; SAMPLE_CAPACITY],
            received_count: 0,
        }
    }

    /// Locally captured samples
    pub fn captured(&self) -> &[u16] {
        &self.mine[..populated_len(&self.mine)]
    }

    /// Samples taken over from the last accepted neighbor beacon
    pub fn relayed(&self) -> &[u16] {
        &self.theirs[..self.received_count]
    }
}

impl Default for DualBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore for DualBuffer {
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome {
        match reading {
            SampleReading::NotReady => CaptureOutcome::NotReady,
            SampleReading::Ready(0) => CaptureOutcome::ZeroReading,
            SampleReading::Ready(value) => fill_first_empty(&mut self.mine, value),
        }
    }

    fn mark_for_send(&mut self) -> SamplePayload {
        SamplePayload::Dual {
            captured: self.mine,
            relayed: self.theirs,
            captured_count: populated_len(&self.mine) as u8,
        }
    }

    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome {
        let SamplePayload::Dual {
            captured, captured_count, ..
        } = payload
        else {
            return MergeOutcome::LayoutMismatch;
        };
        if !accepted {
            return MergeOutcome::WeakLink;
        }
        self.theirs = *captured;
        self.received_count = (*captured_count as usize).min(SAMPLE_CAPACITY);
        MergeOutcome::Merged
    }

    fn reported_readings(&self) -> &[u16] {
        self.relayed()
    }
}
