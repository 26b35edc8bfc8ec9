use serde::{Deserialize, Serialize};

use crate::protocol::{DATA_HUMIDITY_UUID, DATA_TEMPERATURE_UUID, DATA_WATER_UUID, Uuid128};

/// Size of every sensor attribute value.
pub const ATTRIBUTE_VALUE_SIZE: usize = 2;

/// Raw sensor attribute value, little endian.
pub type AttributeValue = [u8; ATTRIBUTE_VALUE_SIZE];

/// Sensor attribute exposed by a node in its data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AttributeKind {
    Temperature = 0,
    Humidity = 1,
    Water = 2,
}

impl AttributeKind {
    pub const COUNT: usize = 3;

    /// Canonical order, used wherever values of a peer are laid out in sequence
    pub const ALL: [AttributeKind; Self::COUNT] =
        [AttributeKind::Temperature, AttributeKind::Humidity, AttributeKind::Water];

    pub const fn uuid(self) -> Uuid128 {
        match self {
            AttributeKind::Temperature => DATA_TEMPERATURE_UUID,
            AttributeKind::Humidity => DATA_HUMIDITY_UUID,
            AttributeKind::Water => DATA_WATER_UUID,
        }
    }

    /// Map a characteristic type to the attribute it carries, `None` for anything outside the data service.
    pub fn from_uuid(uuid: &Uuid128) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.uuid() == *uuid)
    }

    /// Position of the attribute in the canonical order
    pub const fn index(self) -> usize {
        self as usize
    }
}
