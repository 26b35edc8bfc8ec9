pub mod common;

use bluetanist::config::{MeshConfig, ReadRetryConfig, RefreshConfig, RequestRetryConfig};
use bluetanist::event::MeshEvent;
use bluetanist::ledger::Validity;
use bluetanist::peer::PeerState;
use bluetanist::transport::TransportError;
use bluetanist::types::attribute::AttributeKind;
use bluetanist::types::protocol::{DATA_SERVICE_UUID, MASTER_SERVICE_UUID, Uuid128};
use bluetanist::types::record::RECORD_SIZE;

use crate::common::*;

fn no_request_retry_config() -> MeshConfig<'static> {
    MeshConfig {
        request_retry: RequestRetryConfig {
            max_attempts: 0,
            delay: ms(100),
        },
        ..Default::default()
    }
}

fn retry_config() -> MeshConfig<'static> {
    MeshConfig {
        read_retry: ReadRetryConfig {
            max_attempts: 2,
            delay: ms(200),
        },
        ..Default::default()
    }
}

#[test]
fn test_discovery_reaches_ready() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    connect_peer(&mut coordinator, addr(1), 0, at(0));

    // Services other than sensor data are ignored
    coordinator.handle_event(
        MeshEvent::ServiceDiscovered {
            session: 0,
            service: MASTER_SERVICE_UUID,
            start_handle: 1,
            end_handle: 3,
        },
        at(0),
    );
    assert_eq!(coordinator.store().get(&addr(1)).unwrap().state(), PeerState::Connected);

    coordinator.handle_event(data_service(0), at(0));
    assert_eq!(
        coordinator.store().get(&addr(1)).unwrap().state(),
        PeerState::ServiceDiscovered
    );
    assert!(
        coordinator
            .gatt()
            .requests
            .contains(&GattRequest::DiscoverCharacteristics(0, 4, 0xffff))
    );

    coordinator.handle_event(characteristic(0, 5, AttributeKind::Temperature), at(0));
    coordinator.handle_event(characteristic(0, 6, AttributeKind::Humidity), at(0));
    assert_eq!(
        coordinator.store().get(&addr(1)).unwrap().state(),
        PeerState::CharacteristicsDiscovered
    );
    assert_eq!(coordinator.gatt().reads(), vec![(0, 5), (0, 6)]);

    coordinator.handle_event(read_ok(0, 5, &[0x01, 0x00]), at(10));
    coordinator.handle_event(read_ok(0, 6, &[0x2a, 0x00]), at(10));
    let peer = coordinator.store().get(&addr(1)).unwrap();
    assert_eq!(peer.attributes().find_by_handle(5).unwrap().value(), Some([0x01, 0x00]));
    assert!(peer.attributes().find_by_handle(6).unwrap().is_fresh());
    // Water is still missing
    assert_eq!(peer.state(), PeerState::CharacteristicsDiscovered);
    assert!(coordinator.build_snapshot().is_empty());

    coordinator.handle_event(characteristic(0, 7, AttributeKind::Water), at(20));
    coordinator.handle_event(read_ok(0, 7, &[0x10, 0x27]), at(30));
    assert_eq!(coordinator.store().get(&addr(1)).unwrap().state(), PeerState::Ready);

    let snapshot = coordinator.build_snapshot();
    assert_eq!(snapshot.as_bytes(), &[0x00, 0x00, 0x01, 0x00, 0x2a, 0x00, 0x10, 0x27]);
}

#[test]
fn test_unknown_characteristic_is_not_tracked() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    coordinator.handle_event(data_service(0), at(0));

    coordinator.handle_event(
        MeshEvent::CharacteristicDiscovered {
            session: 0,
            handle: 9,
            type_id: Uuid128::from_u128(0x2a6e),
        },
        at(0),
    );
    assert!(coordinator.store().get(&addr(1)).unwrap().attributes().is_empty());
    assert!(coordinator.gatt().reads().is_empty());
}

#[test]
fn test_uncorrelated_read_changes_nothing() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    let before = coordinator.store().clone();

    // Handle next to a tracked one, unknown session
    coordinator.handle_event(read_ok(0, 4, &[9, 9]), at(10));
    coordinator.handle_event(read_ok(0, 8, &[9, 9]), at(10));
    coordinator.handle_event(read_ok(3, 5, &[9, 9]), at(10));
    coordinator.handle_event(characteristic(3, 5, AttributeKind::Temperature), at(10));
    coordinator.handle_event(data_service(3), at(10));

    assert_eq!(coordinator.store(), &before);
}

#[test]
fn test_read_value_is_stored_verbatim() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));

    // Longer values keep their first two bytes
    coordinator.handle_event(read_ok(0, 6, &[0x55, 0x01, 0xff]), at(10));
    let entry = coordinator
        .store()
        .get(&addr(1))
        .unwrap()
        .attributes()
        .find_by_kind(AttributeKind::Humidity)
        .unwrap()
        .clone();
    assert_eq!(entry.value(), Some([0x55, 0x01]));
    assert_eq!(entry.validity(), Validity::Fresh);
}

#[test]
fn test_failed_read_keeps_value() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    let reads = coordinator.gatt().reads().len();

    coordinator.handle_event(read_err(0, 5, 0x0e), at(10));
    let peer = coordinator.store().get(&addr(1)).unwrap();
    let entry = peer.attributes().find_by_handle(5).unwrap();
    assert_eq!(entry.validity(), Validity::Stale);
    assert_eq!(entry.value(), Some([1, 0]));
    assert_eq!(peer.state(), PeerState::Ready);

    // No retry by default
    assert_eq!(coordinator.next_deadline(), None);
    assert_eq!(coordinator.gatt().reads().len(), reads);

    // A short value counts as failure too
    coordinator.handle_event(read_ok(0, 6, &[0x01]), at(10));
    let entry = coordinator.store().get(&addr(1)).unwrap().attributes().find_by_handle(6).unwrap();
    assert_eq!(entry.validity(), Validity::Stale);
    assert_eq!(entry.value(), Some([2, 0]));
}

#[test]
fn test_failed_read_is_retried() {
    let mut coordinator = new_coordinator(retry_config());
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    coordinator.handle_event(data_service(0), at(0));
    coordinator.handle_event(characteristic(0, 5, AttributeKind::Temperature), at(0));

    coordinator.handle_event(read_err(0, 5, 0x0e), at(100));
    assert_eq!(coordinator.next_deadline(), Some(at(300)));
    coordinator.on_timer(at(300));
    assert_eq!(coordinator.gatt().reads(), vec![(0, 5), (0, 5)]);

    coordinator.handle_event(read_err(0, 5, 0x0e), at(400));
    coordinator.on_timer(at(600));
    assert_eq!(coordinator.gatt().reads().len(), 3);

    // Third consecutive failure exhausts the retries
    coordinator.handle_event(read_err(0, 5, 0x0e), at(700));
    assert_eq!(coordinator.next_deadline(), None);
    assert_eq!(
        coordinator
            .store()
            .get(&addr(1))
            .unwrap()
            .attributes()
            .find_by_handle(5)
            .unwrap()
            .failed_reads(),
        3
    );
}

#[test]
fn test_retry_of_old_connection_is_dropped() {
    let mut coordinator = new_coordinator(retry_config());
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    coordinator.handle_event(data_service(0), at(0));
    coordinator.handle_event(characteristic(0, 5, AttributeKind::Temperature), at(0));
    coordinator.handle_event(read_err(0, 5, 0x0e), at(100));

    // The node drops and comes back on the same session before the retry is due
    coordinator.handle_event(MeshEvent::Disconnected { session: 0 }, at(150));
    coordinator.handle_event(MeshEvent::ScanCompleted, at(160));
    coordinator.handle_event(advertised(addr(1)), at(170));
    coordinator.handle_event(connected(0, addr(1)), at(180));
    let generation = coordinator.store().get(&addr(1)).unwrap().connection().unwrap().generation;
    assert_eq!(generation, 2);
    coordinator.handle_event(data_service(0), at(190));
    coordinator.handle_event(characteristic(0, 5, AttributeKind::Temperature), at(190));
    let reads = coordinator.gatt().reads().len();

    coordinator.on_timer(at(300));
    assert_eq!(coordinator.gatt().reads().len(), reads);
    assert_eq!(coordinator.next_deadline(), None);
}

#[test]
fn test_disconnect_forgets_attributes() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    assert_eq!(coordinator.build_snapshot().len(), RECORD_SIZE);

    coordinator.handle_event(MeshEvent::Disconnected { session: 0 }, at(10));
    assert!(coordinator.build_snapshot().is_empty());

    // Late events of the closed connection are no-ops
    coordinator.handle_event(read_ok(0, 5, &[7, 7]), at(20));
    assert!(coordinator.store().is_empty());
}

#[test]
fn test_snapshot_of_multiple_peers() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    ready_peer(&mut coordinator, addr(2), 1, [[4, 0], [5, 0], [6, 0]], at(10));
    // Connected but not ready
    connect_peer(&mut coordinator, addr(3), 2, at(20));

    let snapshot = coordinator.build_snapshot();
    assert_eq!(snapshot.len() % RECORD_SIZE, 0);
    assert_eq!(snapshot.peer_count(), 2);
    assert_eq!(snapshot, coordinator.build_snapshot());

    // Most recently discovered first
    let records: Vec<_> = snapshot.records().collect();
    assert_eq!(records[0].session, 1);
    assert_eq!(records[0].value(AttributeKind::Water), [6, 0]);
    assert_eq!(records[1].session, 0);
    assert_eq!(records[1].value(AttributeKind::Temperature), [1, 0]);
}

#[test]
fn test_refresh_rereads_and_keeps_snapshot() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    connect_peer(&mut coordinator, addr(2), 1, at(10));
    let before = coordinator.build_snapshot();
    let reads = coordinator.gatt().reads().len();

    coordinator.refresh(at(15));
    assert_eq!(coordinator.gatt().reads()[reads..], [(0, 5), (0, 6), (0, 7)]);
    let peer = coordinator.store().get(&addr(1)).unwrap();
    assert!(peer.attributes().iter().all(|e| e.validity() == Validity::Stale));
    assert_eq!(coordinator.build_snapshot(), before);

    coordinator.handle_event(read_ok(0, 7, &[0x20, 0x00]), at(20));
    let records: Vec<_> = coordinator.build_snapshot().records().collect();
    assert_eq!(records[0].value(AttributeKind::Water), [0x20, 0x00]);
}

#[test]
fn test_periodic_refresh() {
    let config = MeshConfig {
        refresh: RefreshConfig {
            on_aggregate_read: false,
            interval: Some(ms(1000)),
        },
        ..Default::default()
    };
    let mut coordinator = new_coordinator(config);
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    assert_eq!(coordinator.next_deadline(), Some(at(1000)));

    coordinator.on_timer(at(1000));
    assert_eq!(coordinator.gatt().reads().len(), 6);
    assert_eq!(coordinator.next_deadline(), Some(at(2000)));
}

#[test]
fn test_rejected_read_is_retried() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    coordinator.handle_event(data_service(0), at(0));

    coordinator.gatt_mut().results.push_back(Err(TransportError::Busy));
    for (i, kind) in AttributeKind::ALL.into_iter().enumerate() {
        coordinator.handle_event(characteristic(0, 5 + i as u16, kind), at(0));
    }
    coordinator.handle_event(read_ok(0, 6, &[2, 0]), at(10));
    coordinator.handle_event(read_ok(0, 7, &[3, 0]), at(10));
    let peer = coordinator.store().get(&addr(1)).unwrap();
    assert_eq!(peer.state(), PeerState::CharacteristicsDiscovered);
    assert_eq!(peer.attributes().find_by_handle(5).unwrap().failed_reads(), 1);
    assert_eq!(coordinator.next_deadline(), Some(at(100)));

    coordinator.on_timer(at(100));
    assert_eq!(coordinator.gatt().reads(), vec![(0, 5), (0, 6), (0, 7), (0, 5)]);
    coordinator.handle_event(read_ok(0, 5, &[1, 0]), at(110));
    assert_eq!(coordinator.store().get(&addr(1)).unwrap().state(), PeerState::Ready);
    assert_eq!(coordinator.build_snapshot().as_bytes(), &[0, 0, 1, 0, 2, 0, 3, 0]);
}

#[test]
fn test_rejected_discovery_is_retried() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    coordinator.gatt_mut().results.push_back(Err(TransportError::Busy));
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    assert_eq!(coordinator.store().get(&addr(1)).unwrap().state(), PeerState::Connected);
    assert_eq!(coordinator.next_deadline(), Some(at(100)));

    coordinator.on_timer(at(100));
    assert_eq!(
        coordinator.gatt().requests,
        vec![GattRequest::DiscoverService(0, DATA_SERVICE_UUID); 2]
    );

    coordinator.gatt_mut().results.push_back(Err(TransportError::Busy));
    coordinator.handle_event(data_service(0), at(110));
    assert_eq!(coordinator.next_deadline(), Some(at(210)));
    coordinator.on_timer(at(210));
    assert_eq!(
        coordinator.gatt().requests[2..],
        [GattRequest::DiscoverCharacteristics(0, 4, 0xffff); 2]
    );

    for (i, kind) in AttributeKind::ALL.into_iter().enumerate() {
        coordinator.handle_event(characteristic(0, 5 + i as u16, kind), at(220));
        coordinator.handle_event(read_ok(0, 5 + i as u16, &[i as u8, 0]), at(230));
    }
    assert_eq!(coordinator.store().get(&addr(1)).unwrap().state(), PeerState::Ready);
}

#[test]
fn test_peer_dropped_when_discovery_keeps_failing() {
    let mut coordinator = new_coordinator(MeshConfig::default());
    coordinator
        .gatt_mut()
        .results
        .extend([Err(TransportError::Busy); 4]);
    connect_peer(&mut coordinator, addr(1), 0, at(0));

    coordinator.on_timer(at(100));
    coordinator.on_timer(at(200));
    assert!(coordinator.store().contains(&addr(1)));
    assert!(coordinator.link().disconnects.is_empty());

    // Fourth rejection uses up the retries
    coordinator.on_timer(at(300));
    assert_eq!(coordinator.gatt().requests.len(), 4);
    assert!(coordinator.store().is_empty());
    assert_eq!(coordinator.link().disconnects, vec![0]);
    assert_eq!(coordinator.next_deadline(), None);
    // The slot is free and the node can be found again
    assert_eq!(coordinator.link().scans, 2);

    // Disconnect of the dropped session is a no-op
    coordinator.handle_event(MeshEvent::Disconnected { session: 0 }, at(400));
    assert_eq!(coordinator.link().scans, 2);
}

#[test]
fn test_peer_dropped_when_first_read_rejected() {
    let mut coordinator = new_coordinator(no_request_retry_config());
    connect_peer(&mut coordinator, addr(1), 0, at(0));
    coordinator.handle_event(data_service(0), at(0));

    coordinator.gatt_mut().results.push_back(Err(TransportError::Failed(0x0c)));
    coordinator.handle_event(characteristic(0, 5, AttributeKind::Temperature), at(0));
    assert!(coordinator.store().is_empty());
    assert_eq!(coordinator.link().disconnects, vec![0]);
}

#[test]
fn test_rejected_refresh_keeps_cached_value() {
    let mut coordinator = new_coordinator(no_request_retry_config());
    ready_peer(&mut coordinator, addr(1), 0, [[1, 0], [2, 0], [3, 0]], at(0));
    let before = coordinator.build_snapshot();

    coordinator.gatt_mut().results.push_back(Err(TransportError::Busy));
    coordinator.refresh(at(10));
    let peer = coordinator.store().get(&addr(1)).unwrap();
    let entry = peer.attributes().find_by_handle(5).unwrap();
    assert_eq!(entry.validity(), Validity::Stale);
    assert_eq!(entry.failed_reads(), 1);
    assert_eq!(peer.state(), PeerState::Ready);
    assert!(coordinator.link().disconnects.is_empty());
    assert_eq!(coordinator.build_snapshot(), before);
}
