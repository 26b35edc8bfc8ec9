//! Service and characteristic identifiers of the BlueTanist protocol.

use core::fmt;

use serde::{Deserialize, Serialize};

/// 128-bit attribute type identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid128(u128);

impl Uuid128 {
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(self) -> u128 {
        self.0
    }

    /// Bytes in the little endian order used on air.
    pub const fn to_le_bytes(self) -> [u8; 16] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 16]) -> Self {
        Self(u128::from_le_bytes(bytes))
    }
}

impl fmt::Debug for Uuid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xffff_ffff_ffff
        )
    }
}

/// Master control service, carries the role switch and the aggregate read.
pub const MASTER_SERVICE_UUID: Uuid128 = Uuid128::from_u128(0x11111111_0000_0000_0000_111111111111);
/// Write-only: `0` puts the node in node role, anything else in master role.
pub const MASTER_SET_ROLE_UUID: Uuid128 = Uuid128::from_u128(0x11111111_0000_0000_0000_000000000001);
/// Read-only: the aggregate of every ready peer's sensor values.
pub const MASTER_AGGREGATE_UUID: Uuid128 = Uuid128::from_u128(0x11111111_0000_0000_0000_000000000010);

/// Sensor data service exposed by every node.
pub const DATA_SERVICE_UUID: Uuid128 = Uuid128::from_u128(0x22222222_0000_0000_0000_222222222222);
pub const DATA_TEMPERATURE_UUID: Uuid128 = Uuid128::from_u128(0x22222222_0000_0000_0000_000000000001);
pub const DATA_HUMIDITY_UUID: Uuid128 = Uuid128::from_u128(0x22222222_0000_0000_0000_000000000002);
pub const DATA_WATER_UUID: Uuid128 = Uuid128::from_u128(0x22222222_0000_0000_0000_000000000003);

/// AD type of an incomplete list of 128-bit service UUIDs
pub const AD_TYPE_UUID128_INCOMPLETE: u8 = 0x06;

/// Service id every node advertises, as it appears on air.
pub const NODE_IDENTITY_ID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x90, 0x06, 0x42, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x11, 0x11, 0x11,
];

/// The AD structure nodes put at the end of their advertisement.
///
/// The master only matches the [`NODE_IDENTITY_ID`] at its tail.
pub const NODE_IDENTITY_MARKER: [u8; 18] = {
    let mut marker = [0u8; 18];
    // Length covers the AD type byte plus the id
    marker[0] = 17;
    marker[1] = AD_TYPE_UUID128_INCOMPLETE;
    let mut i = 0;
    while i < NODE_IDENTITY_ID.len() {
        marker[i + 2] = NODE_IDENTITY_ID[i];
        i += 1;
    }
    marker
};

/// Largest attribute value the protocol transfers.
pub const ATT_VALUE_MAX_SIZE: usize = 50;

/// Largest legacy advertisement payload.
pub const ADV_PAYLOAD_MAX_SIZE: usize = 31;
