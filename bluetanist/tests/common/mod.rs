#![allow(dead_code)]

use std::collections::VecDeque;

use bluetanist::config::{ConnectParams, MeshConfig, ScanParams};
use bluetanist::coordinator::Coordinator;
use bluetanist::event::{AttStatus, LinkStatus, MeshEvent};
use bluetanist::transport::{AttributeClient, LinkLayer, TransportError};
use bluetanist::types::address::{BdAddr, SessionId};
use bluetanist::types::attribute::AttributeKind;
use bluetanist::types::protocol::{DATA_SERVICE_UUID, NODE_IDENTITY_MARKER, Uuid128};
use embassy_time::{Duration, Instant};

// Init logger for tests
#[ctor::ctor]
pub fn init_log() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}

pub type TestCoordinator = Coordinator<'static, FakeLink, FakeGatt>;

/// Link layer recording every request, scan and connect results are scripted
#[derive(Debug, Default)]
pub struct FakeLink {
    pub scans: usize,
    pub scan_stops: usize,
    pub advertising: usize,
    pub connects: Vec<BdAddr>,
    pub cancels: usize,
    pub disconnects: Vec<SessionId>,
    /// Results of the next scans, `Ok` once exhausted
    pub scan_results: VecDeque<Result<(), TransportError>>,
    /// Results of the next connects, `Ok` once exhausted
    pub connect_results: VecDeque<Result<(), TransportError>>,
}

impl LinkLayer for FakeLink {
    fn start_scan(&mut self, _params: &ScanParams) -> Result<(), TransportError> {
        self.scans += 1;
        self.scan_results.pop_front().unwrap_or(Ok(()))
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.scan_stops += 1;
        Ok(())
    }

    fn connect(&mut self, address: &BdAddr, _params: &ConnectParams) -> Result<(), TransportError> {
        self.connects.push(*address);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn cancel_connect(&mut self) -> Result<(), TransportError> {
        self.cancels += 1;
        Ok(())
    }

    fn disconnect(&mut self, session: SessionId) -> Result<(), TransportError> {
        self.disconnects.push(session);
        Ok(())
    }

    fn start_advertising(&mut self) -> Result<(), TransportError> {
        self.advertising += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GattRequest {
    DiscoverService(SessionId, Uuid128),
    DiscoverCharacteristics(SessionId, u16, u16),
    Read(SessionId, u16),
}

/// Attribute client recording every request, results are scripted
#[derive(Debug, Default)]
pub struct FakeGatt {
    pub requests: Vec<GattRequest>,
    /// Results of the next requests of any kind, `Ok` once exhausted
    pub results: VecDeque<Result<(), TransportError>>,
}

impl FakeGatt {
    pub fn reads(&self) -> Vec<(SessionId, u16)> {
        self.requests
            .iter()
            .filter_map(|r| match r {
                GattRequest::Read(session, handle) => Some((*session, *handle)),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, request: GattRequest) -> Result<(), TransportError> {
        self.requests.push(request);
        self.results.pop_front().unwrap_or(Ok(()))
    }
}

impl AttributeClient for FakeGatt {
    fn discover_service(&mut self, session: SessionId, service: &Uuid128) -> Result<(), TransportError> {
        self.record(GattRequest::DiscoverService(session, *service))
    }

    fn discover_characteristics(
        &mut self,
        session: SessionId,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), TransportError> {
        self.record(GattRequest::DiscoverCharacteristics(session, start_handle, end_handle))
    }

    fn read_attribute(&mut self, session: SessionId, handle: u16) -> Result<(), TransportError> {
        self.record(GattRequest::Read(session, handle))
    }
}

pub fn addr(last: u8) -> BdAddr {
    BdAddr::new([0xc0, 0x11, 0x22, 0x33, 0x44, last])
}

pub fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

pub fn ms(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// A node advertisement: flags, then the identity marker at the tail
pub fn node_adv_payload() -> Vec<u8> {
    let mut payload = vec![0x02, 0x01, 0x06];
    payload.extend_from_slice(&NODE_IDENTITY_MARKER);
    payload
}

pub fn advertised(address: BdAddr) -> MeshEvent {
    MeshEvent::advertised(address, &node_adv_payload())
}

pub fn connected(session: SessionId, address: BdAddr) -> MeshEvent {
    MeshEvent::Connected {
        session,
        local_address: BdAddr::new([0xc0, 0, 0, 0, 0, 0]),
        peer_address: address,
        status: LinkStatus::Success,
    }
}

pub fn data_service(session: SessionId) -> MeshEvent {
    MeshEvent::ServiceDiscovered {
        session,
        service: DATA_SERVICE_UUID,
        start_handle: 4,
        end_handle: 0xffff,
    }
}

pub fn characteristic(session: SessionId, handle: u16, kind: AttributeKind) -> MeshEvent {
    MeshEvent::CharacteristicDiscovered {
        session,
        handle,
        type_id: kind.uuid(),
    }
}

pub fn read_ok(session: SessionId, handle: u16, value: &[u8]) -> MeshEvent {
    MeshEvent::read_completed(session, handle, value, AttStatus::Success)
}

pub fn read_err(session: SessionId, handle: u16, code: u8) -> MeshEvent {
    MeshEvent::read_completed(session, handle, &[], AttStatus::Error(code))
}

pub fn new_coordinator(config: MeshConfig<'static>) -> TestCoordinator {
    let mut coordinator = Coordinator::new(config, FakeLink::default(), FakeGatt::default());
    coordinator.start(at(0)).unwrap();
    coordinator
}

/// Discover `address` and connect it on `session`, up to the service discovery request
pub fn connect_peer(coordinator: &mut TestCoordinator, address: BdAddr, session: SessionId, now: Instant) {
    coordinator.handle_event(advertised(address), now);
    coordinator.handle_event(MeshEvent::ScanCompleted, now);
    coordinator.handle_event(connected(session, address), now);
}

/// Bring `address` to ready, with temperature, humidity and water at handles 5, 6 and 7
pub fn ready_peer(
    coordinator: &mut TestCoordinator,
    address: BdAddr,
    session: SessionId,
    values: [[u8; 2]; 3],
    now: Instant,
) {
    connect_peer(coordinator, address, session, now);
    coordinator.handle_event(data_service(session), now);
    for (i, kind) in AttributeKind::ALL.into_iter().enumerate() {
        coordinator.handle_event(characteristic(session, 5 + i as u16, kind), now);
    }
    for (i, value) in values.iter().enumerate() {
        coordinator.handle_event(read_ok(session, 5 + i as u16, value), now);
    }
}
