//! Radio link quality gate
//!
//! Decides from the RSSI attached to each received frame whether the link to
//! the sender is good enough to take over the sender's samples. The verdict is
//! recomputed for every frame and never stored.

/// Minimum RSSI (in dBm) for a link to be considered good
///
/// Frames at exactly this strength are accepted.
pub const RSSI_THRESHOLD: i16 = -70;

/// RSSI threshold filter for inbound frames
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkQualityFilter {
    threshold: i16,
}

impl LinkQualityFilter {
    pub const fn new(threshold: i16) -> Self {
        LinkQualityFilter { threshold }
    }

    pub const fn threshold(&self) -> i16 {
        self.threshold
    }

    /// Returns true iff `rssi` is at or above the threshold
    ///
    /// # Example
    /// ```rust
    /// use beacon_discovery_lib::radio_devices::LinkQualityFilter;
    ///
    /// let filter = LinkQualityFilter::default();
    /// assert!(filter.accept(-70));
    /// assert!(!filter.accept(-71));
    /// ```
    pub const fn accept(&self, rssi: i16) -> bool {
        rssi >= self.threshold
    }
}

impl Default for LinkQualityFilter {
    fn default() -> Self {
        Self::new(RSSI_THRESHOLD)
    }
}
