//! Events reported by the link layer and the attribute transport.

use bluetanist_types::address::{BdAddr, SessionId};
use bluetanist_types::protocol::{ADV_PAYLOAD_MAX_SIZE, ATT_VALUE_MAX_SIZE, Uuid128};
use heapless::Vec;

pub type AdvPayload = Vec<u8, ADV_PAYLOAD_MAX_SIZE>;
pub type AttValue = Vec<u8, ATT_VALUE_MAX_SIZE>;

/// Outcome of a connection procedure, carrying the HCI status code on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Success,
    Failed(u8),
}

/// Outcome of an attribute read, carrying the ATT error code on failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttStatus {
    Success,
    Error(u8),
}

/// Every event the mesh coordinator consumes.
///
/// Events of one connection are expected in the order the peer produced them. Events
/// that can't be correlated to a tracked peer are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshEvent {
    /// Advertisement report received while scanning
    PeerAdvertised { address: BdAddr, payload: AdvPayload },
    /// The scan procedure has ended
    ScanCompleted,
    /// A connection procedure has completed
    Connected {
        session: SessionId,
        local_address: BdAddr,
        peer_address: BdAddr,
        status: LinkStatus,
    },
    Disconnected { session: SessionId },
    /// Primary service found, with its attribute handle range
    ServiceDiscovered {
        session: SessionId,
        service: Uuid128,
        start_handle: u16,
        end_handle: u16,
    },
    /// Characteristic found, `handle` is its value handle
    CharacteristicDiscovered {
        session: SessionId,
        handle: u16,
        type_id: Uuid128,
    },
    ReadCompleted {
        session: SessionId,
        handle: u16,
        value: AttValue,
        status: AttStatus,
    },
}

impl MeshEvent {
    /// Build an advertisement event, truncating payloads longer than a legacy advertisement
    pub fn advertised(address: BdAddr, payload: &[u8]) -> Self {
        let len = payload.len().min(ADV_PAYLOAD_MAX_SIZE);
        let payload = Vec::from_slice(&payload[..len]).unwrap_or_default();
        MeshEvent::PeerAdvertised { address, payload }
    }

    /// Build a read completion event, truncating values longer than the protocol allows
    pub fn read_completed(session: SessionId, handle: u16, value: &[u8], status: AttStatus) -> Self {
        let len = value.len().min(ATT_VALUE_MAX_SIZE);
        let value = Vec::from_slice(&value[..len]).unwrap_or_default();
        MeshEvent::ReadCompleted {
            session,
            handle,
            value,
            status,
        }
    }
}
