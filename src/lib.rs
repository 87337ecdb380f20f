#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(feature = "radio-device-echo", feature = "radio-device-simulator"))]
compile_error!("Only one radio implementation feature can be enabled at a time");

#[cfg(all(not(test), not(any(feature = "radio-device-echo", feature = "radio-device-simulator"))))]
compile_error!("At least one radio implementation feature must be enabled");

pub mod messages;
pub mod radio_devices;
pub mod sample_source;
pub mod sample_store;
mod rx_handler;
mod tx_scheduler;

#[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
use crate::radio_devices::{RadioDevice, radio_device_task};

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::log;
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

pub use messages::{BeaconPacket, DecodeError, RadioFrame, ReceivedFrame, SamplePayload, record_size};
pub use radio_devices::{LinkQualityFilter, RSSI_THRESHOLD};
pub use sample_source::{SampleReading, SampleSource, SimulatedLightSensor};
pub use sample_store::{BufferPolicy, CaptureOutcome, MergeOutcome, SampleBuffer, SampleStore};

//Constants that affect compatibility of a node: both ends must agree on them
/// Largest frame the radio can carry
pub const RADIO_FRAME_SIZE: usize = 127;
/// Number of readings in the multi-sample payload layouts
pub const SAMPLE_CAPACITY: usize = 10;
/// Size of the `source_id`, `timestamp`, `sequence` header of every beacon
pub const BEACON_HEADER_SIZE: usize = 12;

const _: () = assert!(SAMPLE_CAPACITY <= u8::MAX as usize);

//Default duty cycle, overridable through DiscoveryConfiguration
pub const DEFAULT_SENDS_PER_BURST: u8 = 2;
pub const DEFAULT_SLEEP_CYCLE: u16 = 9;
pub const DEFAULT_WAKE_TIME_MS: u16 = 100;
pub const DEFAULT_SLEEP_SLOT_MS: u16 = 100;

// Every task pool is carved out of the executor's task arena
// (`task-arena-size-32768`), three pools of MAX_NODE_COUNT tasks in total.
#[cfg(feature = "radio-device-simulator")]
const MAX_NODE_COUNT: usize = 8;

#[cfg(not(feature = "radio-device-simulator"))]
const MAX_NODE_COUNT: usize = 1;

const RADIO_COMMAND_QUEUE_SIZE: usize = 16;
type RadioCommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;
type RadioCommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;
type RadioCommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RADIO_COMMAND_QUEUE: RadioCommandQueue = Channel::new();

const RX_FRAME_QUEUE_SIZE: usize = 16;
type RxFrameQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;
type RxFrameQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;
type RxFrameQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RX_FRAME_QUEUE: RxFrameQueue = Channel::new();

const INBOUND_BEACON_QUEUE_SIZE: usize = 8;
type InboundBeaconQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, InboundBeacon, INBOUND_BEACON_QUEUE_SIZE>;
type InboundBeaconQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, InboundBeacon, INBOUND_BEACON_QUEUE_SIZE>;
type InboundBeaconQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, InboundBeacon, INBOUND_BEACON_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static INBOUND_BEACON_QUEUE: InboundBeaconQueue = Channel::new();

const DISCOVERY_EVENT_QUEUE_SIZE: usize = 32;
type DiscoveryEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, DiscoveryEvent, DISCOVERY_EVENT_QUEUE_SIZE>;
type DiscoveryEventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, DiscoveryEvent, DISCOVERY_EVENT_QUEUE_SIZE>;
type DiscoveryEventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, DiscoveryEvent, DISCOVERY_EVENT_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static DISCOVERY_EVENT_QUEUE: DiscoveryEventQueue = Channel::new();

/// Commands from the scheduler to the radio device
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioCommand {
    PowerOn,
    PowerOff,
    /// Broadcast a frame to every node in range
    Broadcast(RadioFrame),
}

/// Decoded neighbor beacon that passed the link-quality gate
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) struct InboundBeacon {
    pub(crate) packet: BeaconPacket,
    pub(crate) rssi: i16,
    #[allow(dead_code)]
    pub(crate) sender_address: u32,
}

/// Observable discovery activity, delivered through `NeighborDiscoveryManager::receive_event`
///
/// Events are dropped when the application does not drain the queue.
#[derive(Clone, Copy, PartialEq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DiscoveryEvent {
    /// A beacon was handed to the radio
    BeaconSent { sequence: u32, timestamp: u32 },
    /// A well-formed neighbor beacon was received, accepted or not
    NeighborHeard {
        source_id: u32,
        sequence: u32,
        rssi: i16,
        accepted: bool,
    },
    /// An accepted neighbor beacon was offered to the sample store
    SamplesMerged { source_id: u32, outcome: MergeOutcome },
    /// A burst finished and the radio went to sleep
    SleepScheduled { slots: u32 },
}

/// When a sample is captured
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum CaptureMode {
    /// At the first send of every burst
    EveryBurst,
    /// At the first send of the first burst only
    OnceAtStart,
    /// Never; the node only relays
    Never,
}

/// Runtime configuration of a discovery node
///
/// Nodes only understand each other's beacons when they run the same
/// `buffer_policy`.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct DiscoveryConfiguration {
    pub buffer_policy: BufferPolicy,
    pub capture_mode: CaptureMode,
    /// Beacons sent per wake period, at least 1
    pub sends_per_burst: u8,
    /// Mean number of sleep slots between bursts, 0 for continuous beaconing
    pub sleep_cycle: u16,
    /// Delay between the sends of a burst, in milliseconds
    pub wake_time_ms: u16,
    /// Length of one sleep slot, in milliseconds
    pub sleep_slot_ms: u16,
    /// Weakest RSSI (dBm) whose beacons are merged
    pub rssi_threshold: i16,
}

impl Default for DiscoveryConfiguration {
    fn default() -> Self {
        DiscoveryConfiguration {
            buffer_policy: BufferPolicy::OverwriteSingle,
            capture_mode: CaptureMode::EveryBurst,
            sends_per_burst: DEFAULT_SENDS_PER_BURST,
            sleep_cycle: DEFAULT_SLEEP_CYCLE,
            wake_time_ms: DEFAULT_WAKE_TIME_MS,
            sleep_slot_ms: DEFAULT_SLEEP_SLOT_MS,
            rssi_threshold: RSSI_THRESHOLD,
        }
    }
}

impl DiscoveryConfiguration {
    fn is_valid(&self) -> bool {
        self.sends_per_burst > 0 && self.wake_time_ms > 0
    }
}

#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum InitializeError {
    TaskSpawnFailed,
    InvalidConfiguration,
    AlreadyInitialized,
}

#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveEventError {
    NotInited,
}

enum NeighborDiscoveryManagerState {
    Uninitialized,
    Initialized {
        event_queue_receiver: DiscoveryEventQueueReceiver,
    },
}

/// Entry point of the library
///
/// Spawns the radio device, scheduler and receive handler tasks of one node
/// and hands out its discovery events.
pub struct NeighborDiscoveryManager {
    state: NeighborDiscoveryManagerState,
}

impl Default for NeighborDiscoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborDiscoveryManager {
    pub const fn new() -> Self {
        NeighborDiscoveryManager {
            state: NeighborDiscoveryManagerState::Uninitialized,
        }
    }

    #[cfg(all(feature = "embedded", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sample_source: &'static mut dyn SampleSource,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        self.initialize_common(
            config,
            spawner,
            radio_device,
            sample_source,
            &RADIO_COMMAND_QUEUE,
            &RX_FRAME_QUEUE,
            &INBOUND_BEACON_QUEUE,
            &DISCOVERY_EVENT_QUEUE,
            own_node_id,
            rng_seed,
        )
    }

    #[cfg(all(feature = "std", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sample_source: &'static mut dyn SampleSource,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        if !config.is_valid() {
            return Err(InitializeError::InvalidConfiguration);
        }
        if self.is_initialized() {
            return Err(InitializeError::AlreadyInitialized);
        }
        let radio_command_queue: &'static RadioCommandQueue = Box::leak(Box::new(Channel::new()));
        let rx_frame_queue: &'static RxFrameQueue = Box::leak(Box::new(Channel::new()));
        let inbound_beacon_queue: &'static InboundBeaconQueue = Box::leak(Box::new(Channel::new()));
        let discovery_event_queue: &'static DiscoveryEventQueue = Box::leak(Box::new(Channel::new()));
        self.initialize_common(
            config,
            spawner,
            radio_device,
            sample_source,
            radio_command_queue,
            rx_frame_queue,
            inbound_beacon_queue,
            discovery_event_queue,
            own_node_id,
            rng_seed,
        )
    }

    #[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
    #[allow(clippy::too_many_arguments)]
    fn initialize_common(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sample_source: &'static mut dyn SampleSource,
        radio_command_queue: &'static RadioCommandQueue,
        rx_frame_queue: &'static RxFrameQueue,
        inbound_beacon_queue: &'static InboundBeaconQueue,
        discovery_event_queue: &'static DiscoveryEventQueue,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        if !config.is_valid() {
            return Err(InitializeError::InvalidConfiguration);
        }
        if self.is_initialized() {
            return Err(InitializeError::AlreadyInitialized);
        }
        let mut rng = WyRand::seed_from_u64(rng_seed);

        log!(
            log::Level::Info,
            "Node {} will be sending packet of size {} Bytes",
            own_node_id,
            record_size(config.buffer_policy)
        );

        spawner
            .spawn(radio_device_task(
                radio_device,
                radio_command_queue.receiver(),
                rx_frame_queue.sender(),
                own_node_id,
            ))
            .map_err(|_| InitializeError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "Radio device task spawned");

        spawner
            .spawn(tx_scheduler::tx_scheduler_task(
                config,
                sample_source,
                inbound_beacon_queue.receiver(),
                radio_command_queue.sender(),
                discovery_event_queue.sender(),
                own_node_id,
                rng.next_u64(),
            ))
            .map_err(|_| InitializeError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "TX Scheduler task spawned");

        spawner
            .spawn(rx_handler::rx_handler_task(
                rx_frame_queue.receiver(),
                inbound_beacon_queue.sender(),
                discovery_event_queue.sender(),
                config.buffer_policy,
                config.rssi_threshold,
                own_node_id,
            ))
            .map_err(|_| InitializeError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "RX Handler task spawned");
        log!(log::Level::Info, "Neighbor discovery initialized");

        self.state = NeighborDiscoveryManagerState::Initialized {
            event_queue_receiver: discovery_event_queue.receiver(),
        };
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.state, NeighborDiscoveryManagerState::Initialized { .. })
    }

    /// Waits for the next discovery event
    pub async fn receive_event(&self) -> Result<DiscoveryEvent, ReceiveEventError> {
        let event_queue_receiver = match &self.state {
            NeighborDiscoveryManagerState::Uninitialized => {
                return Err(ReceiveEventError::NotInited);
            }
            NeighborDiscoveryManagerState::Initialized { event_queue_receiver } => event_queue_receiver,
        };
        Ok(event_queue_receiver.receive().await)
    }

    /// Returns the next discovery event if one is queued
    pub fn try_receive_event(&self) -> Result<Option<DiscoveryEvent>, ReceiveEventError> {
        match &self.state {
            NeighborDiscoveryManagerState::Uninitialized => Err(ReceiveEventError::NotInited),
            NeighborDiscoveryManagerState::Initialized { event_queue_receiver } => Ok(event_queue_receiver.try_receive().ok()),
        }
    }
}
