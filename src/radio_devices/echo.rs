//! # Radio Device Echo - Loopback Device for Testing
//!
//! Minimal radio device that delivers every broadcast frame straight back to
//! the node's own receive path. No actual radio transmission occurs.
//!
//! ## Behavior
//!
//! - `PowerOn` / `PowerOff` toggle the simulated transceiver
//! - `Broadcast` while powered is echoed as a received frame, stamped with the
//!   device's configured RSSI and the node's own address
//! - `Broadcast` while powered off is dropped, as a real radio would not transmit
//!
//! The configurable RSSI makes it possible to exercise both sides of the
//! link-quality gate with a single node.
//!
//! ## Limitations
//!
//! - Single node only, no network topology
//! - No airtime, collisions or frame loss

use crate::MAX_NODE_COUNT;
use crate::RSSI_THRESHOLD;
use crate::{RadioCommand, ReceivedFrame};
use crate::{RadioCommandQueueReceiver, RxFrameQueueSender};
use embassy_sync::channel::TrySendError;
use log::{Level, log};

/// RSSI stamped on echoed frames unless configured otherwise
pub const DEFAULT_ECHO_RSSI: i16 = -40;

/// Echo radio device task - loops broadcasts back for testing
///
/// # Arguments
/// * `radio_device` - Echo device with its configured RSSI
/// * `radio_command_receiver` - Commands from the TX scheduler
/// * `rx_sender` - Channel sender for received (echoed) frames
/// * `own_node_id` - This node's ID, used as the echoed sender address
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    radio_command_receiver: RadioCommandQueueReceiver,
    rx_sender: RxFrameQueueSender,
    own_node_id: u32,
) -> ! {
    log!(Level::Info, "[{}] Echo radio device task started", own_node_id);
    loop {
        let command = radio_command_receiver.receive().await;
        radio_device.handle_command(command, &rx_sender, own_node_id);
    }
}

/// Echo radio device - loopback implementation for testing
///
/// # Example
/// ```rust,ignore
/// // Echoed beacons arrive below the default -70 dBm threshold and are never merged
/// let radio_device = RadioDevice::with_rssi(-85);
/// ```
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioDevice {
    rssi: i16,
    powered: bool,
}

impl Default for RadioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDevice {
    pub const fn new() -> Self {
        Self::with_rssi(DEFAULT_ECHO_RSSI)
    }

    pub const fn with_rssi(rssi: i16) -> Self {
        RadioDevice { rssi, powered: false }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Whether echoed frames pass the default link-quality gate
    pub fn echoes_strong_link(&self) -> bool {
        self.rssi >= RSSI_THRESHOLD
    }

    /// Applies one command
    ///
    /// # Returns
    /// True if a frame was echoed to the receive path
    fn handle_command(&mut self, command: RadioCommand, rx_sender: &RxFrameQueueSender, own_node_id: u32) -> bool {
        match command {
            RadioCommand::PowerOn => {
                log::trace!("[{}] Echo radio powered on", own_node_id);
                self.powered = true;
                false
            }
            RadioCommand::PowerOff => {
                log::trace!("[{}] Echo radio powered off", own_node_id);
                self.powered = false;
                false
            }
            RadioCommand::Broadcast(frame) => {
                if !self.powered {
                    log!(Level::Warn, "[{}] Broadcast while radio is off, dropping frame", own_node_id);
                    return false;
                }
                log::trace!("[{}] Echoing frame of {} bytes", own_node_id, frame.length);
                let received = ReceivedFrame {
                    frame,
                    rssi: self.rssi,
                    sender_address: own_node_id,
                };
                match rx_sender.try_send(received) {
                    Ok(_) => true,
                    Err(TrySendError::Full(dropped)) => {
                        // Backpressure: drop echoed frame and log
                        log!(
                            Level::Warn,
                            "[{}] RX queue full, dropping echoed frame of {} bytes",
                            own_node_id,
                            dropped.frame.length
                        );
                        false
                    }
                }
            }
        }
    }
}
