//! Request side of the external radio and attribute transports.
//!
//! Every request returns as soon as it's queued by the transport, its outcome arrives
//! later as a [`MeshEvent`](crate::event::MeshEvent).

use bluetanist_types::address::{BdAddr, SessionId};
use bluetanist_types::protocol::Uuid128;

use crate::config::{ConnectParams, ScanParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// The radio is busy with another procedure, the request can be retried later
    Busy,
    /// The session doesn't refer to an active connection
    NotConnected,
    InvalidParameter,
    /// Any other stack error code
    Failed(u8),
}

/// Link layer service: scanning, advertising, connection establishment and teardown
pub trait LinkLayer {
    fn start_scan(&mut self, params: &ScanParams) -> Result<(), TransportError>;

    fn stop_scan(&mut self) -> Result<(), TransportError>;

    /// Initiate a connection. Completion is reported by `MeshEvent::Connected`.
    fn connect(&mut self, address: &BdAddr, params: &ConnectParams) -> Result<(), TransportError>;

    /// Abort the connect in progress, if any
    fn cancel_connect(&mut self) -> Result<(), TransportError>;

    /// Close an established connection. The transport still reports `MeshEvent::Disconnected`.
    fn disconnect(&mut self, session: SessionId) -> Result<(), TransportError>;

    fn start_advertising(&mut self) -> Result<(), TransportError>;
}

/// Attribute protocol client of the transport
pub trait AttributeClient {
    fn discover_service(&mut self, session: SessionId, service: &Uuid128) -> Result<(), TransportError>;

    fn discover_characteristics(
        &mut self,
        session: SessionId,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), TransportError>;

    fn read_attribute(&mut self, session: SessionId, handle: u16) -> Result<(), TransportError>;
}
