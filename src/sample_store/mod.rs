//! # Sample Store - Capture and Relay Buffer Policies
//!
//! Holds the ambient-light samples a node captures locally and the samples
//! it takes over from neighbors' beacons.
//!
//! ## Architecture
//!
//! Every policy implements the `SampleStore` trait:
//! - `capture`: store one local reading (or note that the sensor was not ready)
//! - `mark_for_send`: produce the payload for the next outgoing beacon
//! - `merge_received`: fold a neighbor's payload into the store
//! - `reported_readings`: readings printed by the transfer report
//!
//! `SampleBuffer` wraps the four strategies and is selected at configuration
//! time through `BufferPolicy`. The policy also fixes the beacon wire layout,
//! so two nodes only understand each other if they run the same policy.
//!
//! ## Policies
//!
//! - **OverwriteSingle**: one value, overwritten by each capture and each accepted merge
//! - **ShiftFifo**: queue with oldest-drop, evicted by the peer's `has_read` flag
//! - **FillUntilFull**: zero-sentinel array, frozen when full, merged only while empty
//! - **DualBuffer**: separate capture ("mine") and relay ("theirs") arrays
//!
//! Zero is the empty-slot sentinel throughout: a zero reading is indistinguishable
//! from an empty slot.
//!
//! ## Acknowledgement Flag
//!
//! OverwriteSingle and ShiftFifo set `has_read` when they take over a neighbor's
//! sample. The flag rides on the next outgoing beacon only (`mark_for_send`
//! clears it) and tells the neighbor to evict what was consumed. The flag is not
//! bound to a sequence number or node, so frame loss or reordering can evict the
//! wrong sample; this is a known limitation of the protocol.

mod dual_buffer;
mod fill_until_full;
mod overwrite_single;
mod shift_fifo;

pub use dual_buffer::DualBuffer;
pub use fill_until_full::FillUntilFull;
pub use overwrite_single::OverwriteSingle;
pub use shift_fifo::ShiftFifo;

use crate::SamplePayload;
use crate::sample_source::SampleReading;

/// Sample buffer management policy
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum BufferPolicy {
    OverwriteSingle,
    ShiftFifo,
    FillUntilFull,
    DualBuffer,
}

/// Result of a capture attempt
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum CaptureOutcome {
    /// Reading stored in a free slot
    Stored,
    /// Reading replaced an unsent previous value
    Overwrote,
    /// Buffer was full, the oldest reading was dropped to make room
    DroppedOldest,
    /// Buffer was full, the reading was refused
    BufferFull,
    /// Sensor was not ready, nothing stored
    NotReady,
    /// Reading was zero, which cannot be told apart from an empty slot; nothing stored
    ZeroReading,
}

/// Result of merging a neighbor's payload
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum MergeOutcome {
    /// Neighbor samples were taken over
    Merged,
    /// Only the neighbor's acknowledgement was applied (local sample evicted)
    Acknowledged,
    /// Accepted, but the payload carried nothing to take over
    NothingToMerge,
    /// Destination already holds data, payload refused
    AlreadyPopulated,
    /// A previous take-over is not acknowledged yet, payload refused
    AckPending,
    /// Link too weak, payload ignored
    WeakLink,
    /// Payload uses another policy's layout
    LayoutMismatch,
}

/// Common interface of the sample buffer policies
pub trait SampleStore {
    /// Stores one local capture attempt
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome;

    /// Returns the payload for the next outgoing beacon
    ///
    /// Does not remove samples. Clears the one-shot acknowledgement flag where
    /// the policy has one.
    fn mark_for_send(&mut self) -> SamplePayload;

    /// Folds a neighbor's payload into the store
    ///
    /// `accepted` is the link-quality verdict for the frame; a rejected frame
    /// never changes the store.
    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome;

    /// Readings listed by the transfer report
    fn reported_readings(&self) -> &[u16];
}

/// Length of the populated prefix of a zero-sentinel array
pub(crate) fn populated_len(readings: &[u16]) -> usize {
    readings.iter().position(|reading| *reading == 0).unwrap_or(readings.len())
}

/// Writes `value` into the first slot still holding the zero sentinel
pub(crate) fn fill_first_empty(readings: &mut [u16], value: u16) -> CaptureOutcome {
    match readings.iter_mut().find(|slot| **slot == 0) {
        Some(slot) => {
            *slot = value;
            CaptureOutcome::Stored
        }
        None => CaptureOutcome::BufferFull,
    }
}

/// Sample store selected at configuration time
pub enum SampleBuffer {
    OverwriteSingle(OverwriteSingle),
    ShiftFifo(ShiftFifo),
    FillUntilFull(FillUntilFull),
    DualBuffer(DualBuffer),
}

impl SampleBuffer {
    /// Creates an empty store for the given policy
    pub fn new(policy: BufferPolicy) -> Self {
        match policy {
            BufferPolicy::OverwriteSingle => SampleBuffer::OverwriteSingle(OverwriteSingle::new()),
            BufferPolicy::ShiftFifo => SampleBuffer::ShiftFifo(ShiftFifo::new()),
            BufferPolicy::FillUntilFull => SampleBuffer::FillUntilFull(FillUntilFull::new()),
            BufferPolicy::DualBuffer => SampleBuffer::DualBuffer(DualBuffer::new()),
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        match self {
            SampleBuffer::OverwriteSingle(_) => BufferPolicy::OverwriteSingle,
            SampleBuffer::ShiftFifo(_) => BufferPolicy::ShiftFifo,
            SampleBuffer::FillUntilFull(_) => BufferPolicy::FillUntilFull,
            SampleBuffer::DualBuffer(_) => BufferPolicy::DualBuffer,
        }
    }

    fn store(&self) -> &dyn SampleStore {
        match self {
            SampleBuffer::OverwriteSingle(store) => store,
            SampleBuffer::ShiftFifo(store) => store,
            SampleBuffer::FillUntilFull(store) => store,
            SampleBuffer::DualBuffer(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn SampleStore {
        match self {
            SampleBuffer::OverwriteSingle(store) => store,
            SampleBuffer::ShiftFifo(store) => store,
            SampleBuffer::FillUntilFull(store) => store,
            SampleBuffer::DualBuffer(store) => store,
        }
    }
}

impl SampleStore for SampleBuffer {
    fn capture(&mut self, reading: SampleReading) -> CaptureOutcome {
        self.store_mut().capture(reading)
    }

    fn mark_for_send(&mut self) -> SamplePayload {
        self.store_mut().mark_for_send()
    }

    fn merge_received(&mut self, payload: &SamplePayload, accepted: bool) -> MergeOutcome {
        self.store_mut().merge_received(payload, accepted)
    }

    fn reported_readings(&self) -> &[u16] {
        self.store().reported_readings()
    }
}
