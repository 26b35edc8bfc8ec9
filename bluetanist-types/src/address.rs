use serde::{Deserialize, Serialize};

/// Transport index of an active connection.
///
/// Only meaningful while the connection is up, the transport hands the same
/// index out again after a disconnect.
pub type SessionId = u16;

/// Bluetooth device address, stable across connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const fn new(raw: [u8; 6]) -> Self {
        Self(raw)
    }

    pub const fn into_inner(self) -> [u8; 6] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl From<[u8; 6]> for BdAddr {
    fn from(raw: [u8; 6]) -> Self {
        Self(raw)
    }
}
