use beacon_discovery_lib::radio_devices::RadioDevice;
use beacon_discovery_lib::{BufferPolicy, DiscoveryConfiguration, DiscoveryEvent, NeighborDiscoveryManager, SimulatedLightSensor};
use embassy_executor::Spawner;
use env_logger::Builder;
use log::LevelFilter;
use log::log;

fn parse_policy(name: &str) -> Option<BufferPolicy> {
    match name {
        "single" => Some(BufferPolicy::OverwriteSingle),
        "fifo" => Some(BufferPolicy::ShiftFifo),
        "batch" => Some(BufferPolicy::FillUntilFull),
        "dual" => Some(BufferPolicy::DualBuffer),
        _ => None,
    }
}

// Usage: echo-node [node_id] [single|fifo|batch|dual] [echo_rssi]
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Info).parse_default_env().init();

    let args: Vec<String> = std::env::args().collect();
    let node_id: u32 = args.get(1).and_then(|arg| arg.parse().ok()).unwrap_or(1);
    let buffer_policy = args.get(2).and_then(|arg| parse_policy(arg)).unwrap_or(BufferPolicy::ShiftFifo);
    let echo_rssi: i16 = args.get(3).and_then(|arg| arg.parse().ok()).unwrap_or(-40);

    let config = DiscoveryConfiguration {
        buffer_policy,
        sleep_cycle: 3,
        ..DiscoveryConfiguration::default()
    };
    let sensor: &'static mut SimulatedLightSensor = Box::leak(Box::new(SimulatedLightSensor::new(400, node_id as u64)));

    let mut manager = NeighborDiscoveryManager::new();
    if let Err(err) = manager.initialize(config, spawner, RadioDevice::with_rssi(echo_rssi), sensor, node_id, 0x5eed ^ node_id as u64) {
        log!(log::Level::Error, "Error initializing neighbor discovery: {:?}", err);
        return;
    }
    let manager: &'static NeighborDiscoveryManager = Box::leak(Box::new(manager));

    loop {
        match manager.receive_event().await {
            Ok(DiscoveryEvent::NeighborHeard {
                source_id,
                sequence,
                rssi,
                accepted,
            }) => {
                log!(
                    log::Level::Debug,
                    "Heard node {} seq {} at {} dBm ({})",
                    source_id,
                    sequence,
                    rssi,
                    if accepted { "accepted" } else { "too weak" }
                );
            }
            Ok(event) => log!(log::Level::Debug, "Event: {:?}", event),
            Err(err) => {
                log!(log::Level::Error, "Event queue unavailable: {:?}", err);
                return;
            }
        }
    }
}
