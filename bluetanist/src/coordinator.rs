//! Scan and connect coordination of the master.
//!
//! The coordinator owns the peer store and every pending request. It's driven by
//! [`Coordinator::handle_event`] for transport events and by [`Coordinator::on_timer`]
//! once [`Coordinator::next_deadline`] is reached, always from the same context.

use bluetanist_types::address::{BdAddr, SessionId};
use embassy_time::Instant;
use heapless::Vec;

use crate::aggregate::{Snapshot, build_snapshot};
use crate::config::MeshConfig;
use crate::error::MeshError;
use crate::event::{LinkStatus, MeshEvent};
use crate::peer::{ConnectionId, Peer, PeerState, PeerStore};
use crate::transport::{AttributeClient, LinkLayer, TransportError};
use crate::{MAX_PEERS, SCHEDULED_REQUEST_CAPACITY};

/// The single connect procedure allowed at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutstandingConnect {
    pub(crate) address: BdAddr,
    pub(crate) phase: ConnectPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectPhase {
    /// The radio was busy, try again at the given time
    RetryAt(Instant),
    /// Connect accepted by the link layer, waiting for `MeshEvent::Connected`
    AwaitingCompletion { deadline: Instant },
}

impl ConnectPhase {
    fn deadline(&self) -> Instant {
        match self {
            ConnectPhase::RetryAt(at) => *at,
            ConnectPhase::AwaitingCompletion { deadline } => *deadline,
        }
    }
}

/// Request issued to the attribute client of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum AttributeRequest {
    DiscoverService,
    DiscoverCharacteristics { start_handle: u16, end_handle: u16 },
    Read { handle: u16 },
}

/// Request retry, bound to the connection it was issued on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScheduledRequest {
    pub(crate) connection: ConnectionId,
    pub(crate) request: AttributeRequest,
    /// Rejected issues of this request so far
    pub(crate) rejections: u8,
    pub(crate) at: Instant,
}

pub struct Coordinator<'a, L: LinkLayer, G: AttributeClient> {
    pub(crate) config: MeshConfig<'a>,
    pub(crate) link: L,
    pub(crate) gatt: G,
    pub(crate) store: PeerStore,
    /// Discovered peers waiting for a connect, popped from the back
    pending: Vec<BdAddr, MAX_PEERS>,
    outstanding: Option<OutstandingConnect>,
    /// Peer whose connect was cancelled, a completion racing the cancel is closed again
    abandoned_connect: Option<BdAddr>,
    scanning: bool,
    active: bool,
    /// A rescan is due once the connect queue is drained
    pub(crate) rescan_requested: bool,
    last_generation: u32,
    pub(crate) scheduled_requests: Vec<ScheduledRequest, SCHEDULED_REQUEST_CAPACITY>,
    next_refresh: Option<Instant>,
}

impl<'a, L: LinkLayer, G: AttributeClient> Coordinator<'a, L, G> {
    pub fn new(config: MeshConfig<'a>, link: L, gatt: G) -> Self {
        Self {
            config,
            link,
            gatt,
            store: PeerStore::new(),
            pending: Vec::new(),
            outstanding: None,
            abandoned_connect: None,
            scanning: false,
            active: false,
            rescan_requested: false,
            last_generation: 0,
            scheduled_requests: Vec::new(),
            next_refresh: None,
        }
    }

    pub fn config(&self) -> &MeshConfig<'a> {
        &self.config
    }

    pub fn store(&self) -> &PeerStore {
        &self.store
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn gatt(&self) -> &G {
        &self.gatt
    }

    pub fn gatt_mut(&mut self) -> &mut G {
        &mut self.gatt
    }

    /// Whether the node is currently coordinating as master
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    /// Addresses waiting for a connect, next one first
    pub fn pending(&self) -> impl Iterator<Item = &BdAddr> {
        self.pending.iter().rev()
    }

    /// Address of the peer being connected, if any
    pub fn connecting(&self) -> Option<BdAddr> {
        self.outstanding.map(|o| o.address)
    }

    /// Start coordinating: scan for nodes and arm the periodic refresh
    pub fn start(&mut self, now: Instant) -> Result<(), MeshError> {
        info!("Starting mesh coordination");
        self.active = true;
        self.next_refresh = self.config.refresh.interval.map(|interval| now + interval);
        self.start_scan()
    }

    /// Stop scanning and connecting. Peers that are already connected stay tracked.
    pub fn stop(&mut self) {
        info!("Stopping mesh coordination");
        self.active = false;
        if self.scanning {
            if let Err(e) = self.link.stop_scan() {
                warn!("Failed to stop scanning: {:?}", e);
            }
            self.scanning = false;
        }
        while let Some(address) = self.pending.pop() {
            self.store.remove(&address);
        }
        if let Some(outstanding) = self.outstanding.take() {
            if matches!(outstanding.phase, ConnectPhase::AwaitingCompletion { .. }) {
                self.cancel_connect(outstanding.address);
            }
            self.store.remove(&outstanding.address);
        }
        self.rescan_requested = false;
        self.next_refresh = None;
    }

    pub fn start_scan(&mut self) -> Result<(), MeshError> {
        self.link.start_scan(&self.config.scan_params)?;
        info!("Scanning for mesh nodes");
        self.scanning = true;
        Ok(())
    }

    /// Serialize every ready peer into the aggregate buffer
    pub fn build_snapshot(&self) -> Snapshot {
        build_snapshot(&self.store)
    }

    /// Process one transport event. Failures are logged, they never leave the dispatcher.
    pub fn handle_event(&mut self, event: MeshEvent, now: Instant) {
        let result = match event {
            MeshEvent::PeerAdvertised { address, payload } => self.on_peer_advertisement(address, &payload, now),
            MeshEvent::ScanCompleted => {
                self.on_scan_complete(now);
                Ok(())
            }
            MeshEvent::Connected {
                session,
                peer_address,
                status,
                ..
            } => self.on_connection_complete(session, peer_address, status, now),
            MeshEvent::Disconnected { session } => {
                self.on_disconnected(session, now);
                Ok(())
            }
            MeshEvent::ServiceDiscovered {
                session,
                service,
                start_handle,
                end_handle,
            } => self.on_service_discovered(session, &service, start_handle, end_handle, now),
            MeshEvent::CharacteristicDiscovered {
                session,
                handle,
                type_id,
            } => self.on_characteristic_discovered(session, handle, &type_id, now),
            MeshEvent::ReadCompleted {
                session,
                handle,
                value,
                status,
            } => self.on_read_completed(session, handle, &value, status, now),
        };
        if let Err(e) = result {
            error!("Mesh event handling error: {:?}", e);
        }
    }

    /// Earliest time [`Coordinator::on_timer`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        let connect = self.outstanding.map(|o| o.phase.deadline());
        let request = self.scheduled_requests.iter().map(|r| r.at).min();
        [connect, request, self.next_refresh].into_iter().flatten().min()
    }

    /// Run everything that's due at `now`
    pub fn on_timer(&mut self, now: Instant) {
        if let Some(outstanding) = self.outstanding {
            match outstanding.phase {
                ConnectPhase::RetryAt(at) if at <= now => {
                    self.outstanding = None;
                    if let Err(e) = self.try_connect(outstanding.address, now) {
                        warn!("Connecting to {:?} failed: {:?}", outstanding.address, e);
                        self.store.remove(&outstanding.address);
                        self.connect_next(now);
                    }
                }
                ConnectPhase::AwaitingCompletion { deadline } if deadline <= now => {
                    warn!("Connecting to {:?} timed out, dropping it", outstanding.address);
                    self.outstanding = None;
                    self.cancel_connect(outstanding.address);
                    self.store.remove(&outstanding.address);
                    self.connect_next(now);
                }
                _ => {}
            }
        }

        self.run_scheduled_requests(now);

        if let Some(at) = self.next_refresh
            && at <= now
        {
            self.refresh(now);
            self.next_refresh = self.config.refresh.interval.map(|interval| now + interval);
        }
    }

    pub(crate) fn on_peer_advertisement(
        &mut self,
        address: BdAddr,
        payload: &[u8],
        now: Instant,
    ) -> Result<(), MeshError> {
        if !self.active || !payload.ends_with(self.config.identity_marker) {
            return Ok(());
        }
        if self.store.contains(&address) {
            trace!("Node {:?} already known", address);
            return Ok(());
        }

        self.store.insert(address)?;
        if self.pending.push(address).is_err() {
            self.store.remove(&address);
            return Err(MeshError::PeerCapacity);
        }
        info!("Found mesh node {:?}", address);

        // Late report after the scan has ended, the queue won't be drained otherwise
        if !self.scanning {
            self.connect_next(now);
        }
        Ok(())
    }

    pub(crate) fn on_scan_complete(&mut self, now: Instant) {
        info!("Scan completed, {} node(s) to connect", self.pending.len());
        self.scanning = false;
        self.connect_next(now);
    }

    pub(crate) fn on_connection_complete(
        &mut self,
        session: SessionId,
        peer_address: BdAddr,
        status: LinkStatus,
        now: Instant,
    ) -> Result<(), MeshError> {
        let initiated = matches!(
            self.outstanding,
            Some(OutstandingConnect {
                address,
                phase: ConnectPhase::AwaitingCompletion { .. },
            }) if address == peer_address
        );
        if !initiated {
            if status == LinkStatus::Success && self.abandoned_connect == Some(peer_address) {
                warn!("Cancelled connect to {:?} completed anyway, closing session {}", peer_address, session);
                self.abandoned_connect = None;
                self.link.disconnect(session)?;
                return Ok(());
            }
            debug!("Ignoring connection {} from {:?}", session, peer_address);
            return Ok(());
        }
        self.outstanding = None;

        let result = match status {
            LinkStatus::Success => self.bind_connection(session, peer_address, now),
            LinkStatus::Failed(code) => {
                warn!("Connecting to {:?} failed with status {}", peer_address, code);
                self.store.remove(&peer_address);
                Ok(())
            }
        };
        self.connect_next(now);
        result
    }

    fn bind_connection(&mut self, session: SessionId, peer_address: BdAddr, now: Instant) -> Result<(), MeshError> {
        // The session of a connection whose disconnect got lost
        if let Some(stale) = self.store.remove_by_session(session) {
            warn!("Session {} reused, dropping {:?}", session, stale.address());
        }

        self.last_generation = self.last_generation.wrapping_add(1);
        let connection = ConnectionId {
            session,
            generation: self.last_generation,
        };
        let Some(peer) = self.store.get_mut(&peer_address) else {
            return Ok(());
        };
        peer.bind(connection);
        peer.connect_attempts = 0;
        info!("Connected to {:?}, session {}", peer_address, session);

        self.issue_request(connection, AttributeRequest::DiscoverService, 0, now);
        Ok(())
    }

    /// Issue the connect of the next pending peer, unless one is already in progress
    pub(crate) fn connect_next(&mut self, now: Instant) {
        if self.outstanding.is_some() || self.scanning {
            return;
        }
        while let Some(address) = self.pending.pop() {
            if !self.store.contains(&address) {
                continue;
            }
            match self.try_connect(address, now) {
                Ok(()) => return,
                Err(e) => {
                    warn!("Connecting to {:?} failed: {:?}", address, e);
                    self.store.remove(&address);
                }
            }
        }

        if self.rescan_requested && self.active {
            self.rescan_requested = false;
            if let Err(e) = self.start_scan() {
                error!("Failed to restart scanning: {:?}", e);
            }
        }
    }

    fn cancel_connect(&mut self, address: BdAddr) {
        if let Err(e) = self.link.cancel_connect() {
            warn!("Failed to cancel connect to {:?}: {:?}", address, e);
        }
        self.abandoned_connect = Some(address);
    }

    fn try_connect(&mut self, address: BdAddr, now: Instant) -> Result<(), MeshError> {
        let Some(peer) = self.store.get_mut(&address) else {
            return Ok(());
        };
        peer.state = PeerState::Connecting;
        peer.connect_attempts += 1;
        debug!("Connecting to {:?}, attempt {}", address, peer.connect_attempts);

        match self.link.connect(&address, &self.config.connect_params) {
            Ok(()) => {
                if self.abandoned_connect == Some(address) {
                    self.abandoned_connect = None;
                }
                self.outstanding = Some(OutstandingConnect {
                    address,
                    phase: ConnectPhase::AwaitingCompletion {
                        deadline: now + self.config.connect_retry.connect_timeout,
                    },
                });
                Ok(())
            }
            Err(TransportError::Busy) => {
                if let Some(max) = self.config.connect_retry.max_busy_retries
                    && peer.connect_attempts > max
                {
                    return Err(MeshError::RetriesExhausted);
                }
                debug!("Radio busy, retrying connect to {:?}", address);
                self.outstanding = Some(OutstandingConnect {
                    address,
                    phase: ConnectPhase::RetryAt(now + self.config.connect_retry.retry_delay),
                });
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the peer of a closed connection, its record is returned in `Disconnected` state
    pub(crate) fn on_disconnected(&mut self, session: SessionId, now: Instant) -> Option<Peer> {
        let Some(mut peer) = self.store.remove_by_session(session) else {
            debug!("Disconnect of untracked session {}", session);
            return None;
        };
        // Pending read retries of the session are dropped by their generation once due
        peer.state = PeerState::Disconnected;
        info!("Node {:?} disconnected", peer.address());

        if self.active && self.config.rescan_on_disconnect {
            if self.scanning {
                return Some(peer);
            }
            self.rescan_requested = true;
            self.connect_next(now);
        }
        Some(peer)
    }
}
