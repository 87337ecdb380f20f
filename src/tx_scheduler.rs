//! # TX Scheduler - Duty-Cycled Beacon Transmission
//!
//! Drives the node's radio through alternating send bursts and randomized
//! sleep periods, and is the single owner of the sample store and of the
//! beacon being built.
//!
//! ## Duty Cycle
//!
//! ```text
//! STARTING ──► SENDING ──► SLEEPING ──► SENDING ──► …
//! ```
//!
//! - **Sending**: `sends_per_burst` beacons, `wake_time` apart. The radio is powered
//!   on for the first one and, depending on the capture mode, a sample is captured.
//! - **Sleeping**: radio off, then a random number of slots drawn uniformly from
//!   `0..=2 * sleep_cycle`, so the expected sleep is `sleep_cycle` slots. The spread
//!   keeps neighboring nodes from falling into lock-step collisions.
//! - A `sleep_cycle` of zero disables sleeping: bursts follow each other `wake_time` apart.
//!
//! Every resumption ends with exactly one armed timer; deadlines are chained from
//! the previous deadline rather than from "now", so processing time does not
//! accumulate as drift.
//!
//! ## Inbound Beacons
//!
//! Accepted beacons arrive through the inbound queue and are merged between two
//! timer resumptions, never while a beacon is being serialized.

use core::fmt;

use embassy_futures::select::{Either, select};
use embassy_sync::channel::TrySendError;
use embassy_time::{Duration, Instant, TICK_HZ, Timer};
use log::{Level, log};
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

use crate::MAX_NODE_COUNT;
use crate::sample_source::SampleSource;
use crate::sample_store::{CaptureOutcome, MergeOutcome, SampleBuffer, SampleStore};
use crate::{BeaconPacket, CaptureMode, DiscoveryConfiguration, DiscoveryEvent, InboundBeacon, RadioCommand};
use crate::{DiscoveryEventQueueSender, InboundBeaconQueueReceiver, RadioCommandQueueSender};

/// Delay between task start and the first transmission, in milliseconds
const FIRST_WAKE_DELAY_MS: u64 = 1;

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) enum SchedulerPhase {
    Starting,
    Sending,
    Sleeping,
}

/// One beacon transmission requested by the scheduler
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) struct Transmission {
    pub(crate) sequence: u32,
    /// Radio has to be powered on before broadcasting
    pub(crate) power_on: bool,
    /// A sample has to be captured before the beacon is built
    pub(crate) capture: bool,
}

/// Work for one timer resumption
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) struct SchedulerStep {
    pub(crate) transmission: Option<Transmission>,
    /// Burst finished: power the radio off and sleep this many slots
    pub(crate) sleep_slots: Option<u32>,
    /// Time until the next resumption
    pub(crate) wait: Duration,
}

/// Duty-cycle state machine
///
/// Holds no I/O; `advance` is called on every timer expiry and returns what to
/// do and when to be resumed next.
pub(crate) struct DutyCycleScheduler {
    phase: SchedulerPhase,
    sends_per_burst: u8,
    sleep_cycle: u16,
    wake_time: Duration,
    sleep_slot: Duration,
    capture_mode: CaptureMode,
    sends_in_burst: u8,
    remaining_sleep_slots: u32,
    sequence: u32,
    radio_on: bool,
    captured_once: bool,
    rng: WyRand,
}

impl DutyCycleScheduler {
    pub(crate) fn new(config: &DiscoveryConfiguration, rng_seed: u64) -> Self {
        DutyCycleScheduler {
            phase: SchedulerPhase::Starting,
            sends_per_burst: config.sends_per_burst.max(1),
            sleep_cycle: config.sleep_cycle,
            wake_time: Duration::from_millis(config.wake_time_ms as u64),
            sleep_slot: Duration::from_millis(config.sleep_slot_ms as u64),
            capture_mode: config.capture_mode,
            sends_in_burst: 0,
            remaining_sleep_slots: 0,
            sequence: 0,
            radio_on: false,
            captured_once: false,
            rng: WyRand::seed_from_u64(rng_seed),
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Sequence number of the last transmission, 0 before the first one
    #[cfg(test)]
    pub(crate) fn sequence(&self) -> u32 {
        self.sequence
    }

    pub(crate) fn advance(&mut self) -> SchedulerStep {
        if self.phase == SchedulerPhase::Sleeping && self.remaining_sleep_slots > 0 {
            self.remaining_sleep_slots -= 1;
            return SchedulerStep {
                transmission: None,
                sleep_slots: None,
                wait: self.sleep_slot,
            };
        }
        self.send_next()
    }

    fn send_next(&mut self) -> SchedulerStep {
        let first_of_burst = self.sends_in_burst == 0;
        let power_on = !self.radio_on;
        self.radio_on = true;

        let capture = first_of_burst
            && match self.capture_mode {
                CaptureMode::EveryBurst => true,
                CaptureMode::OnceAtStart => !self.captured_once,
                CaptureMode::Never => false,
            };
        if capture {
            self.captured_once = true;
        }

        self.sequence = self.sequence.wrapping_add(1);
        self.sends_in_burst += 1;
        let transmission = Some(Transmission {
            sequence: self.sequence,
            power_on,
            capture,
        });

        if self.sends_in_burst < self.sends_per_burst {
            self.phase = SchedulerPhase::Sending;
            return SchedulerStep {
                transmission,
                sleep_slots: None,
                wait: self.wake_time,
            };
        }

        self.sends_in_burst = 0;
        if self.sleep_cycle == 0 {
            self.phase = SchedulerPhase::Sending;
            return SchedulerStep {
                transmission,
                sleep_slots: None,
                wait: self.wake_time,
            };
        }

        self.radio_on = false;
        let slots = self.draw_sleep_slots();
        let wait = if slots == 0 {
            self.phase = SchedulerPhase::Sending;
            Duration::from_ticks(0)
        } else {
            self.phase = SchedulerPhase::Sleeping;
            self.remaining_sleep_slots = slots - 1;
            self.sleep_slot
        };
        SchedulerStep {
            transmission,
            sleep_slots: Some(slots),
            wait,
        }
    }

    /// Draws a sleep length uniformly from `0..=2 * sleep_cycle` slots
    pub(crate) fn draw_sleep_slots(&mut self) -> u32 {
        let span = 2 * self.sleep_cycle as u32 + 1;
        self.rng.next_u32() % span
    }
}

/// Splits a tick count into whole seconds and milliseconds
pub(crate) fn split_ticks(ticks: u64) -> (u64, u64) {
    (ticks / TICK_HZ, ((ticks % TICK_HZ) * 1000) / TICK_HZ)
}

/// Comma separated reading list for the transfer report
struct ReadingList<'a>(&'a [u16]);

impl fmt::Display for ReadingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, reading) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", reading)?;
        }
        Ok(())
    }
}

/// A node's transmit side: scheduler, sample store and sample source
pub(crate) struct BeaconNode<'a> {
    scheduler: DutyCycleScheduler,
    store: SampleBuffer,
    sample_source: &'a mut dyn SampleSource,
    own_node_id: u32,
}

impl<'a> BeaconNode<'a> {
    pub(crate) fn new(config: &DiscoveryConfiguration, sample_source: &'a mut dyn SampleSource, own_node_id: u32, rng_seed: u64) -> Self {
        BeaconNode {
            scheduler: DutyCycleScheduler::new(config, rng_seed),
            store: SampleBuffer::new(config.buffer_policy),
            sample_source,
            own_node_id,
        }
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &SampleBuffer {
        &self.store
    }

    /// Handles one timer expiry
    ///
    /// # Returns
    /// The delay until the next timer expiry
    pub(crate) fn on_timer(&mut self, now: Instant, radio_command_sender: &RadioCommandQueueSender, event_queue_sender: &DiscoveryEventQueueSender) -> Duration {
        let step = self.scheduler.advance();

        if let Some(transmission) = step.transmission {
            self.transmit(transmission, now, radio_command_sender, event_queue_sender);
        }

        if let Some(slots) = step.sleep_slots {
            self.send_command(RadioCommand::PowerOff, radio_command_sender);
            log!(Level::Info, "[{}] Sleep for {} slots", self.own_node_id, slots);
            let _ = event_queue_sender.try_send(DiscoveryEvent::SleepScheduled { slots });
        }

        step.wait
    }

    fn transmit(
        &mut self,
        transmission: Transmission,
        now: Instant,
        radio_command_sender: &RadioCommandQueueSender,
        event_queue_sender: &DiscoveryEventQueueSender,
    ) {
        if transmission.power_on {
            self.send_command(RadioCommand::PowerOn, radio_command_sender);
        }
        if transmission.capture {
            self.capture_sample();
        }

        let ticks = now.as_ticks();
        let packet = BeaconPacket {
            source_id: self.own_node_id,
            timestamp: ticks as u32,
            sequence: transmission.sequence,
            payload: self.store.mark_for_send(),
        };
        let (seconds, millis) = split_ticks(ticks);
        log!(
            Level::Info,
            "[{}] Send seq# {}  @ {:>8} ticks   {:>3}.{:03}",
            self.own_node_id,
            packet.sequence,
            ticks,
            seconds,
            millis
        );

        self.send_command(RadioCommand::Broadcast(packet.to_frame()), radio_command_sender);
        let _ = event_queue_sender.try_send(DiscoveryEvent::BeaconSent {
            sequence: packet.sequence,
            timestamp: packet.timestamp,
        });
    }

    fn capture_sample(&mut self) {
        let reading = self.sample_source.read();
        match self.store.capture(reading) {
            CaptureOutcome::NotReady => {
                log!(Level::Warn, "[{}] Light sensor not ready, skipping capture", self.own_node_id);
            }
            CaptureOutcome::ZeroReading => {
                log!(Level::Warn, "[{}] Light sensor returned zero, sample not stored", self.own_node_id);
            }
            CaptureOutcome::BufferFull => {
                log!(Level::Debug, "[{}] Sample buffer full, capture refused", self.own_node_id);
            }
            CaptureOutcome::DroppedOldest => {
                log!(Level::Debug, "[{}] Sample buffer full, oldest sample dropped", self.own_node_id);
            }
            CaptureOutcome::Stored | CaptureOutcome::Overwrote => {
                log::trace!("[{}] Sample captured", self.own_node_id);
            }
        }
    }

    fn send_command(&self, command: RadioCommand, radio_command_sender: &RadioCommandQueueSender) {
        if let Err(TrySendError::Full(_)) = radio_command_sender.try_send(command) {
            log!(Level::Warn, "[{}] Radio command queue full, dropping command", self.own_node_id);
        }
    }

    /// Merges an accepted neighbor beacon into the sample store
    ///
    /// The transfer report is logged for every accepted beacon of the local
    /// layout, including ones the store refused to merge.
    pub(crate) fn on_inbound(&mut self, beacon: InboundBeacon, now: Instant, event_queue_sender: &DiscoveryEventQueueSender) -> MergeOutcome {
        let outcome = self.store.merge_received(&beacon.packet.payload, true);
        if outcome == MergeOutcome::LayoutMismatch || outcome == MergeOutcome::WeakLink {
            log!(
                Level::Warn,
                "[{}] Beacon {} from {} not merged",
                self.own_node_id,
                beacon.packet.sequence,
                beacon.packet.source_id
            );
            return outcome;
        }

        let (seconds, _) = split_ticks(now.as_ticks());
        log!(Level::Info, "[{}] {} TRANSFER {}", self.own_node_id, seconds, beacon.packet.source_id);
        log!(Level::Info, "[{}] Light: {}", self.own_node_id, ReadingList(self.store.reported_readings()));

        let _ = event_queue_sender.try_send(DiscoveryEvent::SamplesMerged {
            source_id: beacon.packet.source_id,
            outcome,
        });
        outcome
    }
}

/// Runs one iteration of the scheduler loop
///
/// Waits for whichever comes first, `wake` or an inbound beacon. On wake the
/// duty cycle is advanced and `next_wake` is moved on by the returned delay,
/// measured from the previous deadline.
///
/// # Returns
/// * `None` if the timer fired
/// * `Some(outcome)` if an inbound beacon was merged
pub(crate) async fn tx_scheduler_step<W: Future<Output = ()>>(
    node: &mut BeaconNode<'_>,
    wake: W,
    next_wake: &mut Instant,
    inbound_beacon_queue_receiver: &InboundBeaconQueueReceiver,
    radio_command_sender: &RadioCommandQueueSender,
    event_queue_sender: &DiscoveryEventQueueSender,
) -> Option<MergeOutcome> {
    match select(wake, inbound_beacon_queue_receiver.receive()).await {
        Either::First(_) => {
            let wait = node.on_timer(Instant::now(), radio_command_sender, event_queue_sender);
            *next_wake += wait;
            None
        }
        Either::Second(beacon) => Some(node.on_inbound(beacon, Instant::now(), event_queue_sender)),
    }
}

/// TX Scheduler Task
///
/// Runs the duty cycle forever and merges inbound beacons between timer
/// expiries.
///
/// # Parameters
/// * `config` - Duty cycle and buffer configuration
/// * `sample_source` - Light sensor used for captures
/// * `inbound_beacon_queue_receiver` - Accepted beacons from the RX handler
/// * `radio_command_sender` - Commands to the radio device
/// * `event_queue_sender` - Discovery events for the application
/// * `own_node_id` - This node's ID, carried in every beacon
/// * `rng_seed` - Seed for the sleep length draws
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub(crate) async fn tx_scheduler_task(
    config: DiscoveryConfiguration,
    sample_source: &'static mut dyn SampleSource,
    inbound_beacon_queue_receiver: InboundBeaconQueueReceiver,
    radio_command_sender: RadioCommandQueueSender,
    event_queue_sender: DiscoveryEventQueueSender,
    own_node_id: u32,
    rng_seed: u64,
) -> ! {
    let mut node = BeaconNode::new(&config, sample_source, own_node_id, rng_seed);

    let start = Instant::now();
    let (seconds, millis) = split_ticks(start.as_ticks());
    log!(
        Level::Info,
        "[{}] Start clock {} ticks, timestamp {:>3}.{:03}",
        own_node_id,
        start.as_ticks(),
        seconds,
        millis
    );

    let mut next_wake = start + Duration::from_millis(FIRST_WAKE_DELAY_MS);
    loop {
        tx_scheduler_step(
            &mut node,
            Timer::at(next_wake),
            &mut next_wake,
            &inbound_beacon_queue_receiver,
            &radio_command_sender,
            &event_queue_sender,
        )
        .await;
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::sample_source::SampleReading;
    use crate::sample_store::BufferPolicy;
    use crate::radio_devices::LinkQualityFilter;
    use crate::rx_handler::handle_received_frame;
    use crate::{DiscoveryEventQueue, InboundBeaconQueue, RadioCommandQueue, ReceivedFrame, SamplePayload};
    use embassy_sync::channel::Channel;
    use futures::executor::block_on;

    struct ScriptedSource {
        readings: Vec<SampleReading>,
    }

    impl SampleSource for ScriptedSource {
        fn read(&mut self) -> SampleReading {
            if self.readings.is_empty() {
                SampleReading::NotReady
            } else {
                self.readings.remove(0)
            }
        }
    }

    fn config(policy: BufferPolicy, sends_per_burst: u8, sleep_cycle: u16) -> DiscoveryConfiguration {
        DiscoveryConfiguration {
            buffer_policy: policy,
            sends_per_burst,
            sleep_cycle,
            ..DiscoveryConfiguration::default()
        }
    }

    fn queues() -> (&'static RadioCommandQueue, &'static DiscoveryEventQueue) {
        (Box::leak(Box::new(Channel::new())), Box::leak(Box::new(Channel::new())))
    }

    fn drain_commands(queue: &'static RadioCommandQueue) -> Vec<RadioCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = queue.try_receive() {
            commands.push(command);
        }
        commands
    }

    #[test]
    fn sequence_increases_by_one_per_transmission() {
        let mut scheduler = DutyCycleScheduler::new(&config(BufferPolicy::OverwriteSingle, 2, 3), 7);
        let mut last = scheduler.sequence();
        let mut transmissions = 0;
        for _ in 0..200 {
            if let Some(transmission) = scheduler.advance().transmission {
                assert_eq!(transmission.sequence, last + 1);
                last = transmission.sequence;
                transmissions += 1;
            }
        }
        assert!(transmissions > 0);
        assert_eq!(scheduler.sequence(), last);
    }

    #[test]
    fn sequence_wraps_to_zero() {
        let mut scheduler = DutyCycleScheduler::new(&config(BufferPolicy::OverwriteSingle, 1, 0), 7);
        scheduler.sequence = u32::MAX - 1;
        assert_eq!(scheduler.advance().transmission.unwrap().sequence, u32::MAX);
        assert_eq!(scheduler.advance().transmission.unwrap().sequence, 0);
        assert_eq!(scheduler.advance().transmission.unwrap().sequence, 1);
    }

    #[test]
    fn sleep_draws_stay_in_range_and_average_to_cycle() {
        let cycle = 9u16;
        let mut scheduler = DutyCycleScheduler::new(&config(BufferPolicy::OverwriteSingle, 1, cycle), 12345);
        let trials = 20_000u32;
        let mut total = 0u64;
        let mut seen_max = false;
        let mut seen_zero = false;
        for _ in 0..trials {
            let slots = scheduler.draw_sleep_slots();
            assert!(slots <= 2 * cycle as u32);
            seen_max |= slots == 2 * cycle as u32;
            seen_zero |= slots == 0;
            total += slots as u64;
        }
        let mean = total as f64 / trials as f64;
        assert!((mean - cycle as f64).abs() < 0.3, "mean {} too far from {}", mean, cycle);
        assert!(seen_max && seen_zero);
    }

    #[test]
    fn burst_then_sleep_then_next_burst() {
        let cfg = config(BufferPolicy::OverwriteSingle, 2, 4);
        let mut scheduler = DutyCycleScheduler::new(&cfg, 99);
        assert_eq!(scheduler.phase(), SchedulerPhase::Starting);

        let first = scheduler.advance();
        let transmission = first.transmission.unwrap();
        assert!(transmission.power_on);
        assert!(transmission.capture);
        assert!(first.sleep_slots.is_none());
        assert_eq!(first.wait, Duration::from_millis(cfg.wake_time_ms as u64));
        assert_eq!(scheduler.phase(), SchedulerPhase::Sending);

        let second = scheduler.advance();
        let transmission = second.transmission.unwrap();
        assert!(!transmission.power_on);
        assert!(!transmission.capture);
        let slots = second.sleep_slots.unwrap();
        assert!(slots <= 8);

        // `slots` slot waits in total, the first one armed by the burst's last send
        let mut slot_waits = if slots > 0 { 1 } else { 0 };
        loop {
            let step = scheduler.advance();
            if let Some(transmission) = step.transmission {
                assert!(transmission.power_on, "radio must be powered on after sleeping");
                assert_eq!(transmission.sequence, 3);
                break;
            }
            assert_eq!(step.wait, Duration::from_millis(cfg.sleep_slot_ms as u64));
            slot_waits += 1;
        }
        assert_eq!(slot_waits, slots);
    }

    #[test]
    fn zero_sleep_cycle_beacons_continuously_with_radio_on() {
        let cfg = config(BufferPolicy::OverwriteSingle, 1, 0);
        let mut scheduler = DutyCycleScheduler::new(&cfg, 1);
        for i in 0..50 {
            let step = scheduler.advance();
            let transmission = step.transmission.unwrap();
            assert_eq!(transmission.power_on, i == 0);
            assert!(step.sleep_slots.is_none());
            assert_eq!(step.wait, Duration::from_millis(cfg.wake_time_ms as u64));
        }
    }

    #[test]
    fn capture_modes_decide_when_to_capture() {
        let mut cfg = config(BufferPolicy::ShiftFifo, 1, 0);

        cfg.capture_mode = CaptureMode::OnceAtStart;
        let mut scheduler = DutyCycleScheduler::new(&cfg, 1);
        let captures: Vec<bool> = (0..5).map(|_| scheduler.advance().transmission.unwrap().capture).collect();
        assert_eq!(captures, vec![true, false, false, false, false]);

        cfg.capture_mode = CaptureMode::Never;
        let mut scheduler = DutyCycleScheduler::new(&cfg, 1);
        assert!((0..5).all(|_| !scheduler.advance().transmission.unwrap().capture));

        cfg.capture_mode = CaptureMode::EveryBurst;
        let mut scheduler = DutyCycleScheduler::new(&cfg, 1);
        assert!((0..5).all(|_| scheduler.advance().transmission.unwrap().capture));
    }

    #[test]
    fn zero_sends_per_burst_still_sends_once() {
        let mut scheduler = DutyCycleScheduler::new(&config(BufferPolicy::OverwriteSingle, 0, 0), 1);
        assert!(scheduler.advance().transmission.is_some());
        assert!(scheduler.advance().transmission.is_some());
    }

    #[test]
    fn node_powers_on_captures_and_broadcasts_beacon() {
        let (radio, events) = queues();
        let mut source = ScriptedSource {
            readings: vec![SampleReading::Ready(321)],
        };
        let cfg = config(BufferPolicy::OverwriteSingle, 2, 3);
        let mut node = BeaconNode::new(&cfg, &mut source, 42, 5);

        let wait = node.on_timer(Instant::from_ticks(5_000), &radio.sender(), &events.sender());
        assert_eq!(wait, Duration::from_millis(cfg.wake_time_ms as u64));

        let commands = drain_commands(radio);
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], RadioCommand::PowerOn));
        let RadioCommand::Broadcast(frame) = &commands[1] else {
            panic!("expected broadcast");
        };
        let packet = BeaconPacket::from_frame(frame, BufferPolicy::OverwriteSingle).unwrap();
        assert_eq!(packet.source_id, 42);
        assert_eq!(packet.sequence, 1);
        assert_eq!(packet.timestamp, 5_000);
        assert_eq!(
            packet.payload,
            SamplePayload::Single {
                reading: 321,
                has_read: false
            }
        );
        assert_eq!(
            events.try_receive().unwrap(),
            DiscoveryEvent::BeaconSent {
                sequence: 1,
                timestamp: 5_000
            }
        );
    }

    #[test]
    fn node_turns_radio_off_when_burst_ends() {
        let (radio, events) = queues();
        let mut source = ScriptedSource { readings: vec![] };
        let cfg = config(BufferPolicy::OverwriteSingle, 2, 3);
        let mut node = BeaconNode::new(&cfg, &mut source, 42, 5);

        node.on_timer(Instant::from_ticks(0), &radio.sender(), &events.sender());
        drain_commands(radio);
        node.on_timer(Instant::from_ticks(100), &radio.sender(), &events.sender());

        let commands = drain_commands(radio);
        assert_eq!(commands.len(), 2);
        assert!(matches!(commands[0], RadioCommand::Broadcast(_)));
        assert!(matches!(commands[1], RadioCommand::PowerOff));

        let mut saw_sleep = false;
        while let Ok(event) = events.try_receive() {
            if let DiscoveryEvent::SleepScheduled { slots } = event {
                assert!(slots <= 6);
                saw_sleep = true;
            }
        }
        assert!(saw_sleep);
    }

    #[test]
    fn not_ready_sensor_skips_capture_but_still_sends() {
        let (radio, events) = queues();
        let mut source = ScriptedSource {
            readings: vec![SampleReading::NotReady],
        };
        let cfg = config(BufferPolicy::ShiftFifo, 1, 0);
        let mut node = BeaconNode::new(&cfg, &mut source, 3, 5);

        node.on_timer(Instant::from_ticks(0), &radio.sender(), &events.sender());
        assert!(node.store().reported_readings().is_empty());
        let commands = drain_commands(radio);
        assert!(commands.iter().any(|command| matches!(command, RadioCommand::Broadcast(_))));
    }

    #[test]
    fn accepted_beacon_is_merged_into_store() {
        let (_, events) = queues();
        let mut source = ScriptedSource { readings: vec![] };
        let cfg = config(BufferPolicy::OverwriteSingle, 1, 0);
        let mut node = BeaconNode::new(&cfg, &mut source, 1, 5);

        let beacon = InboundBeacon {
            packet: BeaconPacket {
                source_id: 2,
                timestamp: 10,
                sequence: 8,
                payload: SamplePayload::Single {
                    reading: 123,
                    has_read: false,
                },
            },
            rssi: -65,
            sender_address: 2,
        };
        let outcome = node.on_inbound(beacon, Instant::from_ticks(0), &events.sender());
        assert_eq!(outcome, MergeOutcome::Merged);
        assert_eq!(node.store().reported_readings(), &[123]);
        assert_eq!(
            events.try_receive().unwrap(),
            DiscoveryEvent::SamplesMerged {
                source_id: 2,
                outcome: MergeOutcome::Merged
            }
        );
    }

    #[test]
    fn refused_batch_merge_is_still_reported() {
        let (_, events) = queues();
        let mut source = ScriptedSource {
            readings: vec![SampleReading::Ready(5)],
        };
        let cfg = config(BufferPolicy::FillUntilFull, 1, 0);
        let (radio, _) = queues();
        let mut node = BeaconNode::new(&cfg, &mut source, 1, 5);
        node.on_timer(Instant::from_ticks(0), &radio.sender(), &events.sender());
        while events.try_receive().is_ok() {}

        let mut readings = [0u16; crate::SAMPLE_CAPACITY];
        readings[0] = 77;
        let beacon = InboundBeacon {
            packet: BeaconPacket {
                source_id: 9,
                timestamp: 0,
                sequence: 1,
                payload: SamplePayload::Batch { readings, count: 1 },
            },
            rssi: -30,
            sender_address: 9,
        };
        assert_eq!(node.on_inbound(beacon, Instant::from_ticks(0), &events.sender()), MergeOutcome::AlreadyPopulated);
        assert_eq!(node.store().reported_readings(), &[5]);
        assert_eq!(
            events.try_receive().unwrap(),
            DiscoveryEvent::SamplesMerged {
                source_id: 9,
                outcome: MergeOutcome::AlreadyPopulated
            }
        );
    }

    fn inbound_queue() -> &'static InboundBeaconQueue {
        Box::leak(Box::new(Channel::new()))
    }

    #[test]
    fn step_on_wake_sends_and_chains_deadline() {
        let (radio, events) = queues();
        let inbound = inbound_queue();
        let mut source = ScriptedSource {
            readings: vec![SampleReading::Ready(42)],
        };
        let cfg = config(BufferPolicy::OverwriteSingle, 2, 3);
        let mut node = BeaconNode::new(&cfg, &mut source, 5, 1);
        let start = Instant::from_ticks(1_000);
        let mut next_wake = start;

        let result = block_on(tx_scheduler_step(
            &mut node,
            core::future::ready(()),
            &mut next_wake,
            &inbound.receiver(),
            &radio.sender(),
            &events.sender(),
        ));
        assert_eq!(result, None);
        let wake_time = Duration::from_millis(cfg.wake_time_ms as u64);
        assert_eq!(next_wake, start + wake_time);
        let commands = drain_commands(radio);
        assert!(matches!(commands[0], RadioCommand::PowerOn));
        assert!(matches!(commands[1], RadioCommand::Broadcast(_)));

        // Last send of the burst: the deadline moves by one sleep slot, or not at all for a zero draw
        block_on(tx_scheduler_step(
            &mut node,
            core::future::ready(()),
            &mut next_wake,
            &inbound.receiver(),
            &radio.sender(),
            &events.sender(),
        ));
        let slot = Duration::from_millis(cfg.sleep_slot_ms as u64);
        assert!(next_wake == start + wake_time || next_wake == start + wake_time + slot);
        assert!(matches!(drain_commands(radio).last(), Some(RadioCommand::PowerOff)));
    }

    #[test]
    fn step_merges_inbound_beacon_without_touching_deadline() {
        let (radio, events) = queues();
        let inbound = inbound_queue();
        let mut source = ScriptedSource { readings: vec![] };
        let cfg = config(BufferPolicy::OverwriteSingle, 1, 0);
        let mut node = BeaconNode::new(&cfg, &mut source, 1, 1);
        let mut next_wake = Instant::from_ticks(7_000);

        inbound
            .try_send(InboundBeacon {
                packet: BeaconPacket {
                    source_id: 3,
                    timestamp: 0,
                    sequence: 4,
                    payload: SamplePayload::Single {
                        reading: 55,
                        has_read: false,
                    },
                },
                rssi: -50,
                sender_address: 3,
            })
            .unwrap();

        let result = block_on(tx_scheduler_step(
            &mut node,
            core::future::pending::<()>(),
            &mut next_wake,
            &inbound.receiver(),
            &radio.sender(),
            &events.sender(),
        ));
        assert_eq!(result, Some(MergeOutcome::Merged));
        assert_eq!(next_wake, Instant::from_ticks(7_000));
        assert!(radio.try_receive().is_err());
        assert_eq!(node.store().reported_readings(), &[55]);
    }

    #[test]
    fn strong_neighbor_frame_reaches_the_store() {
        let (radio, events) = queues();
        let inbound = inbound_queue();
        let frame = BeaconPacket {
            source_id: 2,
            timestamp: 900,
            sequence: 17,
            payload: SamplePayload::Single {
                reading: 123,
                has_read: false,
            },
        }
        .to_frame();
        let received = ReceivedFrame {
            frame,
            rssi: -65,
            sender_address: 2,
        };
        let forwarded = handle_received_frame(
            &received,
            BufferPolicy::OverwriteSingle,
            &LinkQualityFilter::default(),
            1,
            &inbound.sender(),
            &events.sender(),
        );
        assert_eq!(forwarded, Some(true));

        let mut source = ScriptedSource { readings: vec![] };
        let cfg = config(BufferPolicy::OverwriteSingle, 2, 9);
        let mut node = BeaconNode::new(&cfg, &mut source, 1, 1);
        let mut next_wake = Instant::from_ticks(0);
        let result = block_on(tx_scheduler_step(
            &mut node,
            core::future::pending::<()>(),
            &mut next_wake,
            &inbound.receiver(),
            &radio.sender(),
            &events.sender(),
        ));
        assert_eq!(result, Some(MergeOutcome::Merged));
        assert_eq!(node.store().reported_readings(), &[123]);

        assert_eq!(
            events.try_receive().unwrap(),
            DiscoveryEvent::NeighborHeard {
                source_id: 2,
                sequence: 17,
                rssi: -65,
                accepted: true
            }
        );
        assert_eq!(
            events.try_receive().unwrap(),
            DiscoveryEvent::SamplesMerged {
                source_id: 2,
                outcome: MergeOutcome::Merged
            }
        );
    }

    #[test]
    fn split_ticks_gives_seconds_and_millis() {
        assert_eq!(split_ticks(0), (0, 0));
        assert_eq!(split_ticks(TICK_HZ), (1, 0));
        assert_eq!(split_ticks(TICK_HZ * 3 + TICK_HZ / 4), (3, 250));
    }

    #[test]
    fn reading_list_is_comma_separated() {
        assert_eq!(format!("{}", ReadingList(&[1, 22, 333])), "1, 22, 333");
        assert_eq!(format!("{}", ReadingList(&[])), "");
    }
}
