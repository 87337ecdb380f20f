use super::{CaptureOutcome, MergeOutcome, SampleStore};
use crate::SamplePayload;
use crate::sample_source::SampleReading;

/// Single-value store, every capture or accepted merge replaces the value
pub struct OverwriteSingle {
    value: u16,
    has_read: bool,
}

impl OverwriteSingle {
    pub const fn new() -> Self {
        OverwriteSingle { value: 0, has_read: false }
    }

    /// Current value, `None` while empty
    pub fn current(&self) -> Option<u16> {
        if self.value == 0 { None } else { Some(self.value) }
    }
}

impl Default for OverwriteSingle {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore for OverwriteSingle {
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome {
        match reading {
            SampleReading::NotReady => CaptureOutcome::NotReady,
            SampleReading::Ready(0) => CaptureOutcome::ZeroReading,
            SampleReading::Ready(value) => {
                let outcome = if self.value != 0 {
                    CaptureOutcome::Overwrote
                } else {
                    CaptureOutcome::Stored
                };
                self.value = value;
                outcome
            }
        }
    }

    fn mark_for_send(&mut self) -> SamplePayload {
        let has_read = self.has_read;
        self.has_read = false;
        SamplePayload::Single {
            reading: self.value,
            has_read,
        }
    }

    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome {
        let SamplePayload::Single {
            reading,
            has_read: peer_has_read,
        } = *payload
        else {
            return MergeOutcome::LayoutMismatch;
        };
        if !accepted {
            return MergeOutcome::WeakLink;
        }

        // The peer consumed our most recent value
        if peer_has_read {
            self.value = 0;
        }

        if reading != 0 {
            self.value = reading;
            self.has_read = true;
            MergeOutcome::Merged
        } else if peer_has_read {
            MergeOutcome::Acknowledged
        } else {
            MergeOutcome::NothingToMerge
        }
    }

    fn reported_readings(&self) -> &[u16] {
        if self.value == 0 {
            &[]
        } else {
            core::slice::from_ref(&self.value)
        }
    }
}
