//! Per peer discovery state machine, driven by attribute transport events.

use bluetanist_types::address::SessionId;
use bluetanist_types::attribute::{ATTRIBUTE_VALUE_SIZE, AttributeKind};
use bluetanist_types::protocol::{DATA_SERVICE_UUID, Uuid128};
use embassy_time::Instant;
use heapless::Vec;

use crate::coordinator::{AttributeRequest, Coordinator, ScheduledRequest};
use crate::error::MeshError;
use crate::event::AttStatus;
use crate::peer::{ConnectionId, PeerState};
use crate::transport::{AttributeClient, LinkLayer};
use crate::{MAX_PEERS, SCHEDULED_REQUEST_CAPACITY};

impl<L: LinkLayer, G: AttributeClient> Coordinator<'_, L, G> {
    pub(crate) fn on_service_discovered(
        &mut self,
        session: SessionId,
        service: &Uuid128,
        start_handle: u16,
        end_handle: u16,
        now: Instant,
    ) -> Result<(), MeshError> {
        if *service != DATA_SERVICE_UUID {
            trace!("Ignoring service {:?} of session {}", service, session);
            return Ok(());
        }
        let Some(peer) = self.store.find_by_session_mut(session) else {
            debug!("Service discovered on untracked session {}", session);
            return Ok(());
        };
        let Some(connection) = peer.connection() else {
            return Ok(());
        };
        if peer.state != PeerState::Connected {
            debug!("Unexpected service discovery on session {} in {:?}", session, peer.state);
            return Ok(());
        }

        debug!("Sensor data service of session {}: {}..{}", session, start_handle, end_handle);
        peer.state = PeerState::ServiceDiscovered;
        let request = AttributeRequest::DiscoverCharacteristics {
            start_handle,
            end_handle,
        };
        self.issue_request(connection, request, 0, now);
        Ok(())
    }

    pub(crate) fn on_characteristic_discovered(
        &mut self,
        session: SessionId,
        handle: u16,
        type_id: &Uuid128,
        now: Instant,
    ) -> Result<(), MeshError> {
        let Some(peer) = self.store.find_by_session_mut(session) else {
            debug!("Characteristic discovered on untracked session {}", session);
            return Ok(());
        };
        let Some(connection) = peer.connection() else {
            return Ok(());
        };
        if !matches!(
            peer.state,
            PeerState::ServiceDiscovered | PeerState::CharacteristicsDiscovered | PeerState::Ready
        ) {
            debug!("Unexpected characteristic on session {} in {:?}", session, peer.state);
            return Ok(());
        }
        let Some(kind) = AttributeKind::from_uuid(type_id) else {
            info!("Unknown characteristic {:?} at handle {} of session {}", type_id, handle, session);
            return Ok(());
        };

        peer.attributes.find_or_create(kind, handle)?;
        if peer.state == PeerState::ServiceDiscovered {
            peer.state = PeerState::CharacteristicsDiscovered;
        }
        // A rebound attribute has no value yet
        peer.update_readiness();

        debug!("Reading {:?} at handle {} of session {}", kind, handle, session);
        self.issue_request(connection, AttributeRequest::Read { handle }, 0, now);
        Ok(())
    }

    pub(crate) fn on_read_completed(
        &mut self,
        session: SessionId,
        handle: u16,
        value: &[u8],
        status: AttStatus,
        now: Instant,
    ) -> Result<(), MeshError> {
        let Some(peer) = self.store.find_by_session_mut(session) else {
            debug!("Read completed on untracked session {}", session);
            return Ok(());
        };
        let Some(connection) = peer.connection() else {
            return Ok(());
        };
        let Some(entry) = peer.attributes.find_by_handle_mut(handle) else {
            debug!("Read completed for untracked handle {} of session {}", handle, session);
            return Ok(());
        };

        let failure = match status {
            AttStatus::Success if value.len() >= ATTRIBUTE_VALUE_SIZE => {
                entry.upsert_value([value[0], value[1]]);
                if peer.update_readiness() {
                    info!("Node {:?} is ready", peer.address());
                }
                return Ok(());
            }
            AttStatus::Success => {
                warn!("Short value ({} bytes) at handle {} of session {}", value.len(), handle, session);
                entry.record_failure()
            }
            AttStatus::Error(code) => {
                warn!("Reading handle {} of session {} failed: {}", handle, session, code);
                entry.record_failure()
            }
        };

        let retry = self.config.read_retry;
        if failure > retry.max_attempts {
            return Ok(());
        }
        self.scheduled_requests
            .push(ScheduledRequest {
                connection,
                request: AttributeRequest::Read { handle },
                rejections: 0,
                at: now + retry.delay,
            })
            .map_err(|_| MeshError::RetryQueueFull)
    }

    /// Send `request` to the attribute client, scheduling a retry if it's rejected.
    ///
    /// `rejections` counts the earlier rejections of the same request.
    pub(crate) fn issue_request(
        &mut self,
        connection: ConnectionId,
        request: AttributeRequest,
        rejections: u8,
        now: Instant,
    ) {
        let session = connection.session;
        let result = match request {
            AttributeRequest::DiscoverService => self.gatt.discover_service(session, &DATA_SERVICE_UUID),
            AttributeRequest::DiscoverCharacteristics {
                start_handle,
                end_handle,
            } => self.gatt.discover_characteristics(session, start_handle, end_handle),
            AttributeRequest::Read { handle } => self.gatt.read_attribute(session, handle),
        };
        let Err(e) = result else {
            return;
        };
        warn!("{:?} on session {} rejected: {:?}", request, session, e);

        if let AttributeRequest::Read { handle } = request
            && let Some(entry) = self
                .store
                .find_by_session_mut(session)
                .and_then(|peer| peer.attributes.find_by_handle_mut(handle))
        {
            entry.record_failure();
        }

        let retry = self.config.request_retry;
        if rejections < retry.max_attempts {
            let scheduled = ScheduledRequest {
                connection,
                request,
                rejections: rejections + 1,
                at: now + retry.delay,
            };
            if self.scheduled_requests.push(scheduled).is_ok() {
                return;
            }
            warn!("No room to retry {:?} on session {}", request, session);
        }
        self.abandon_request(connection, request, now);
    }

    /// Give up on a request whose retries are used up.
    ///
    /// A peer stuck in discovery, or missing a value it never read, can't become ready
    /// on this connection, so it's disconnected to free its slot.
    fn abandon_request(&mut self, connection: ConnectionId, request: AttributeRequest, now: Instant) {
        let Some(peer) = self.store.find_by_session(connection.session) else {
            return;
        };
        if peer.connection() != Some(connection) {
            return;
        }
        if let AttributeRequest::Read { handle } = request
            && peer.attributes.find_by_handle(handle).is_some_and(|e| e.value().is_some())
        {
            // The cached value stays in the aggregate until the next refresh
            return;
        }

        warn!("Giving up on {:?} of session {}, dropping {:?}", request, connection.session, peer.address());
        if let Err(e) = self.link.disconnect(connection.session) {
            warn!("Failed to disconnect session {}: {:?}", connection.session, e);
        }
        self.on_disconnected(connection.session, now);
    }

    /// Issue every request retry that's due, dropping those of a connection that's gone
    pub(crate) fn run_scheduled_requests(&mut self, now: Instant) {
        let mut due: Vec<ScheduledRequest, SCHEDULED_REQUEST_CAPACITY> = Vec::new();
        self.scheduled_requests.retain(|scheduled| {
            if scheduled.at > now {
                return true;
            }
            let _ = due.push(*scheduled);
            false
        });

        for scheduled in due {
            if !self.is_current(scheduled.connection) {
                debug!("Dropping stale {:?} on session {}", scheduled.request, scheduled.connection.session);
                continue;
            }
            self.issue_request(scheduled.connection, scheduled.request, scheduled.rejections, now);
        }
    }

    /// Whether `connection` is still the one its peer is bound to
    fn is_current(&self, connection: ConnectionId) -> bool {
        self.store
            .find_by_session(connection.session)
            .is_some_and(|peer| peer.connection() == Some(connection))
    }

    /// Request new values of every tracked attribute.
    ///
    /// Cached values are kept and marked stale until the new reads complete, so the
    /// aggregate stays the same in the meantime.
    pub fn refresh(&mut self, now: Instant) {
        let mut reads: Vec<(ConnectionId, u16), { MAX_PEERS * AttributeKind::COUNT }> = Vec::new();
        for peer in self.store.iter_mut() {
            if !matches!(peer.state, PeerState::CharacteristicsDiscovered | PeerState::Ready) {
                continue;
            }
            let Some(connection) = peer.connection() else {
                continue;
            };
            for entry in peer.attributes.iter_mut() {
                entry.mark_stale();
                let _ = reads.push((connection, entry.handle()));
            }
        }

        for (connection, handle) in reads {
            // An earlier rejection may have dropped the peer
            if !self.is_current(connection) {
                continue;
            }
            self.issue_request(connection, AttributeRequest::Read { handle }, 0, now);
        }
    }
}
