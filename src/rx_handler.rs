//! # RX Handler - Beacon Reception and Link Gating
//!
//! Runs independently of the duty-cycle scheduler and processes every frame
//! the radio delivers:
//! 1. Frames whose length is not exactly one beacon record are dropped silently
//! 2. The beacon is decoded and the link-quality verdict computed from the RSSI
//! 3. The reception is reported (log line and `NeighborHeard` event) whatever the verdict
//! 4. Accepted beacons are handed to the scheduler task through the inbound queue
//!
//! The handler never touches the sample store or the outgoing beacon; the
//! scheduler task is their only owner, so nothing here can interleave with a
//! beacon being built.

use embassy_sync::channel::TrySendError;
use log::{Level, log};

use crate::radio_devices::LinkQualityFilter;
use crate::sample_store::BufferPolicy;
use crate::{BeaconPacket, DiscoveryEvent, InboundBeacon, MAX_NODE_COUNT, ReceivedFrame};
use crate::{DiscoveryEventQueueSender, InboundBeaconQueueSender, RxFrameQueueReceiver};

/// Decoded frame with its link-quality verdict
pub(crate) struct FrameVerdict {
    pub(crate) beacon: InboundBeacon,
    pub(crate) accepted: bool,
}

/// Decodes a received frame and evaluates its link quality
///
/// # Returns
/// * `Some(FrameVerdict)` for a well-formed beacon, accepted or not
/// * `None` if the frame is not a beacon of the local policy's layout
pub(crate) fn evaluate_frame(received: &ReceivedFrame, policy: BufferPolicy, filter: &LinkQualityFilter) -> Option<FrameVerdict> {
    let packet = BeaconPacket::from_frame(&received.frame, policy).ok()?;
    Some(FrameVerdict {
        beacon: InboundBeacon {
            packet,
            rssi: received.rssi,
            sender_address: received.sender_address,
        },
        accepted: filter.accept(received.rssi),
    })
}

/// Processes one received frame
///
/// # Returns
/// * `Some(true)` if the beacon was accepted and forwarded to the scheduler
/// * `Some(false)` if the beacon was decoded but the link was too weak
/// * `None` if the frame was discarded
pub(crate) fn handle_received_frame(
    received: &ReceivedFrame,
    policy: BufferPolicy,
    filter: &LinkQualityFilter,
    own_node_id: u32,
    inbound_beacon_queue_sender: &InboundBeaconQueueSender,
    event_queue_sender: &DiscoveryEventQueueSender,
) -> Option<bool> {
    let FrameVerdict { beacon, accepted } = evaluate_frame(received, policy, filter)?;

    log!(
        Level::Info,
        "[{}] Received neighbour discovery packet {} with rssi {} from {}",
        own_node_id,
        beacon.packet.sequence,
        beacon.rssi,
        beacon.packet.source_id
    );
    let _ = event_queue_sender.try_send(DiscoveryEvent::NeighborHeard {
        source_id: beacon.packet.source_id,
        sequence: beacon.packet.sequence,
        rssi: beacon.rssi,
        accepted,
    });

    if !accepted {
        log!(
            Level::Debug,
            "[{}] Link to {} below threshold ({} < {}), not merging",
            own_node_id,
            beacon.packet.source_id,
            beacon.rssi,
            filter.threshold()
        );
        return Some(false);
    }

    if let Err(TrySendError::Full(dropped)) = inbound_beacon_queue_sender.try_send(beacon) {
        log!(
            Level::Warn,
            "[{}] Inbound beacon queue full, dropping beacon {} from {}",
            own_node_id,
            dropped.packet.sequence,
            dropped.packet.source_id
        );
    }
    Some(true)
}

#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub(crate) async fn rx_handler_task(
    rx_frame_queue_receiver: RxFrameQueueReceiver,
    inbound_beacon_queue_sender: InboundBeaconQueueSender,
    event_queue_sender: DiscoveryEventQueueSender,
    policy: BufferPolicy,
    rssi_threshold: i16,
    own_node_id: u32,
) -> ! {
    let filter = LinkQualityFilter::new(rssi_threshold);
    log!(Level::Debug, "[{}] RX Handler task started, rssi threshold: {}", own_node_id, rssi_threshold);
    loop {
        let received = rx_frame_queue_receiver.receive().await;
        handle_received_frame(
            &received,
            policy,
            &filter,
            own_node_id,
            &inbound_beacon_queue_sender,
            &event_queue_sender,
        );
    }
}
