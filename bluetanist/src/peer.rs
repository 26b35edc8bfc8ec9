//! Peer record store of the master.

use bluetanist_types::address::{BdAddr, SessionId};
use bluetanist_types::record::AggregateRecord;
use heapless::Vec;

use crate::MAX_PEERS;
use crate::error::MeshError;
use crate::ledger::AttributeLedger;

/// Lifecycle of a peer, from first advertisement to disconnect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerState {
    /// Advertisement captured, waiting in the connect queue
    Discovered,
    /// Connect requested, possibly waiting for the radio to become free
    Connecting,
    /// Link established, sensor data service requested
    Connected,
    /// Sensor data service found, characteristics requested
    ServiceDiscovered,
    /// At least one sensor characteristic found and being read
    CharacteristicsDiscovered,
    /// Every sensor attribute has been read successfully at least once
    Ready,
    Disconnected,
}

/// Identifies one connection to a peer.
///
/// The transport reuses session ids, the generation tells connections on the same session apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionId {
    pub session: SessionId,
    pub generation: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Peer {
    address: BdAddr,
    connection: Option<ConnectionId>,
    pub(crate) state: PeerState,
    pub(crate) attributes: AttributeLedger,
    /// Connect requests issued for the current connect procedure
    pub(crate) connect_attempts: u32,
}

impl Peer {
    pub fn new(address: BdAddr) -> Self {
        Self {
            address,
            connection: None,
            state: PeerState::Discovered,
            attributes: AttributeLedger::new(),
            connect_attempts: 0,
        }
    }

    pub fn address(&self) -> BdAddr {
        self.address
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn connection(&self) -> Option<ConnectionId> {
        self.connection
    }

    pub fn session(&self) -> Option<SessionId> {
        self.connection.map(|c| c.session)
    }

    pub fn attributes(&self) -> &AttributeLedger {
        &self.attributes
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    pub fn is_ready(&self) -> bool {
        self.state == PeerState::Ready
    }

    /// Bind the peer to a new connection, attributes of any earlier connection are dropped
    pub(crate) fn bind(&mut self, connection: ConnectionId) {
        self.connection = Some(connection);
        self.attributes = AttributeLedger::new();
        self.state = PeerState::Connected;
    }

    /// Move between `CharacteristicsDiscovered` and `Ready` according to the ledger.
    ///
    /// Returns true if the peer just became ready.
    pub(crate) fn update_readiness(&mut self) -> bool {
        match self.state {
            PeerState::CharacteristicsDiscovered if self.attributes.is_complete() => {
                self.state = PeerState::Ready;
                true
            }
            PeerState::Ready if !self.attributes.is_complete() => {
                self.state = PeerState::CharacteristicsDiscovered;
                false
            }
            _ => false,
        }
    }

    /// The peer's record in the aggregate buffer, `None` unless it's ready
    pub fn aggregate_record(&self) -> Option<AggregateRecord> {
        if !self.is_ready() {
            return None;
        }
        Some(AggregateRecord {
            session: self.session()?,
            values: self.attributes.values()?,
        })
    }
}

/// Every peer the master knows about.
///
/// Peers are looked up by address or by session, never held by reference across events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerStore {
    // Insertion order, oldest first
    peers: Vec<Peer, MAX_PEERS>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self { peers: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.peers.is_full()
    }

    pub fn contains(&self, address: &BdAddr) -> bool {
        self.get(address).is_some()
    }

    /// Add a newly discovered peer
    pub fn insert(&mut self, address: BdAddr) -> Result<&mut Peer, MeshError> {
        self.peers.push(Peer::new(address)).map_err(|_| MeshError::PeerCapacity)?;
        let last = self.peers.len() - 1;
        Ok(&mut self.peers[last])
    }

    pub fn get(&self, address: &BdAddr) -> Option<&Peer> {
        self.peers.iter().find(|p| p.address == *address)
    }

    pub(crate) fn get_mut(&mut self, address: &BdAddr) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.address == *address)
    }

    pub fn find_by_session(&self, session: SessionId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.session() == Some(session))
    }

    pub(crate) fn find_by_session_mut(&mut self, session: SessionId) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.session() == Some(session))
    }

    pub fn remove(&mut self, address: &BdAddr) -> Option<Peer> {
        let index = self.peers.iter().position(|p| p.address == *address)?;
        Some(self.peers.remove(index))
    }

    pub fn remove_by_session(&mut self, session: SessionId) -> Option<Peer> {
        let index = self.peers.iter().position(|p| p.session() == Some(session))?;
        Some(self.peers.remove(index))
    }

    /// Iterate peers, most recently discovered first
    pub fn iter(&self) -> impl Iterator<Item = &Peer> {
        self.peers.iter().rev()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Peer> {
        self.peers.iter_mut().rev()
    }

    /// Ready peers in iteration order
    pub fn ready_peers(&self) -> impl Iterator<Item = &Peer> {
        self.iter().filter(|p| p.is_ready())
    }
}
