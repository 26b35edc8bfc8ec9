use serde::{Deserialize, Serialize};

use crate::attribute::{AttributeKind, AttributeValue};

/// Latest readings of the node's own sensors.
///
/// Written by the sensor producer, read by the local attribute server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorData {
    pub temperature: AttributeValue,
    pub humidity: AttributeValue,
    pub water: AttributeValue,
}

impl SensorData {
    /// Build a record from raw readings: temperature in 0.1°C, humidity and water level in percent.
    pub const fn from_readings(temperature: u16, humidity: u16, water: u16) -> Self {
        Self {
            temperature: temperature.to_le_bytes(),
            humidity: humidity.to_le_bytes(),
            water: water.to_le_bytes(),
        }
    }

    pub const fn value(&self, kind: AttributeKind) -> AttributeValue {
        match kind {
            AttributeKind::Temperature => self.temperature,
            AttributeKind::Humidity => self.humidity,
            AttributeKind::Water => self.water,
        }
    }

    pub fn set(&mut self, kind: AttributeKind, value: AttributeValue) {
        match kind {
            AttributeKind::Temperature => self.temperature = value,
            AttributeKind::Humidity => self.humidity = value,
            AttributeKind::Water => self.water = value,
        }
    }
}
