//! # Radio Device Simulator - Bridge to a Network Simulator
//!
//! Radio device that exchanges frames with an external network simulator
//! through a pair of queues, so many nodes can run in one process.
//!
//! ## Architecture
//!
//! - **Output Queue**: broadcasts and power changes from this node to the simulator
//! - **Input Queue**: frames the simulator delivers to this node, already
//!   stamped with the RSSI the simulated link produces
//!
//! The simulator owns topology, propagation and loss. The device only tracks
//! whether its transceiver is powered: frames delivered while it sleeps are
//! dropped here, exactly as a powered-down radio would miss them.

use crate::MAX_NODE_COUNT;
use crate::{RadioCommand, RadioFrame, ReceivedFrame};
use crate::{RadioCommandQueueReceiver, RxFrameQueueSender};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::TrySendError;
use log::{Level, log};

/// Size of the radio output message queue
const RADIO_OUTPUT_QUEUE_SIZE: usize = 10;

pub type RadioOutputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;

/// Size of the radio input message queue
const RADIO_INPUT_QUEUE_SIZE: usize = 10;

pub type RadioInputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;

/// Messages sent from the simulated radio to the network simulator
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioOutputMessage {
    /// Broadcast a frame to every node in range
    Broadcast(RadioFrame),
    /// Transceiver powered on (`true`) or off (`false`)
    RadioPower(bool),
}

/// Messages received by the simulated radio from the network simulator
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioInputMessage {
    /// A frame arriving from another node, with its simulated RSSI
    ReceiveFrame(ReceivedFrame),
}

/// Simulated radio device task
///
/// Races between commands from the TX scheduler and frames from the network
/// simulator.
///
/// # Arguments
/// * `radio_device` - Device holding the simulator queue endpoints
/// * `radio_command_receiver` - Commands from the TX scheduler
/// * `rx_sender` - Channel sender for received frames
/// * `own_node_id` - This node's ID for logging
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    radio_command_receiver: RadioCommandQueueReceiver,
    rx_sender: RxFrameQueueSender,
    own_node_id: u32,
) -> ! {
    log!(Level::Info, "[{}] Simulated radio device task started", own_node_id);
    loop {
        let next = select(radio_device.input_queue_receiver.receive(), radio_command_receiver.receive()).await;
        match next {
            Either::First(message) => {
                radio_device.handle_input(message, &rx_sender, own_node_id);
            }
            Either::Second(command) => {
                if let Some(output) = radio_device.handle_command(command, own_node_id) {
                    radio_device.output_queue_sender.send(output).await;
                }
            }
        }
    }
}

/// Simulated radio device
///
/// # Example
/// ```rust,ignore
/// use embassy_sync::channel::Channel;
/// use beacon_discovery_lib::radio_devices::simulator::*;
///
/// static OUTPUT_QUEUE: RadioOutputQueue = Channel::new();
/// static INPUT_QUEUE: RadioInputQueue = Channel::new();
///
/// let radio = RadioDevice::with(OUTPUT_QUEUE.sender(), INPUT_QUEUE.receiver());
/// ```
pub struct RadioDevice {
    /// Sender for outgoing messages to the network simulator
    output_queue_sender: RadioOutputQueueSender,
    /// Receiver for incoming messages from the network simulator
    input_queue_receiver: RadioInputQueueReceiver,
    powered: bool,
}

impl RadioDevice {
    pub const fn with(output_queue_sender: RadioOutputQueueSender, input_queue_receiver: RadioInputQueueReceiver) -> Self {
        RadioDevice {
            output_queue_sender,
            input_queue_receiver,
            powered: false,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Translates a scheduler command into a message for the simulator
    fn handle_command(&mut self, command: RadioCommand, own_node_id: u32) -> Option<RadioOutputMessage> {
        match command {
            RadioCommand::PowerOn => {
                self.powered = true;
                Some(RadioOutputMessage::RadioPower(true))
            }
            RadioCommand::PowerOff => {
                self.powered = false;
                Some(RadioOutputMessage::RadioPower(false))
            }
            RadioCommand::Broadcast(frame) => {
                if !self.powered {
                    log!(Level::Warn, "[{}] Broadcast while radio is off, dropping frame", own_node_id);
                    return None;
                }
                log!(Level::Trace, "[{}] Broadcasting frame of {} bytes", own_node_id, frame.length);
                Some(RadioOutputMessage::Broadcast(frame))
            }
        }
    }

    /// Forwards a simulator frame to the receive path if the radio is listening
    ///
    /// # Returns
    /// True if the frame was forwarded
    fn handle_input(&self, message: RadioInputMessage, rx_sender: &RxFrameQueueSender, own_node_id: u32) -> bool {
        let RadioInputMessage::ReceiveFrame(received) = message;
        if !self.powered {
            log!(
                Level::Trace,
                "[{}] Radio asleep, missed frame from {}",
                own_node_id,
                received.sender_address
            );
            return false;
        }
        match rx_sender.try_send(received) {
            Ok(_) => true,
            Err(TrySendError::Full(dropped)) => {
                log!(
                    Level::Warn,
                    "[{}] RX queue full, dropping frame from {}",
                    own_node_id,
                    dropped.sender_address
                );
                false
            }
        }
    }
}
