//! One peer's record in the master's aggregate buffer.
//!
//! The frame is `[session][temperature][humidity][water]`, every field two bytes,
//! little endian. The aggregate buffer is a plain concatenation of frames, so its
//! length is always a multiple of [`RECORD_SIZE`].

use serde::{Deserialize, Serialize};

use crate::address::SessionId;
use crate::attribute::{ATTRIBUTE_VALUE_SIZE, AttributeKind, AttributeValue};

pub const SESSION_ID_SIZE: usize = core::mem::size_of::<SessionId>();

/// Size of one peer record
pub const RECORD_SIZE: usize = SESSION_ID_SIZE + AttributeKind::COUNT * ATTRIBUTE_VALUE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AggregateRecord {
    pub session: SessionId,
    /// Values in canonical attribute order
    pub values: [AttributeValue; AttributeKind::COUNT],
}

impl AggregateRecord {
    pub const fn value(&self, kind: AttributeKind) -> AttributeValue {
        self.values[kind.index()]
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[..SESSION_ID_SIZE].copy_from_slice(&self.session.to_le_bytes());
        for (i, value) in self.values.iter().enumerate() {
            let start = SESSION_ID_SIZE + i * ATTRIBUTE_VALUE_SIZE;
            buf[start..start + ATTRIBUTE_VALUE_SIZE].copy_from_slice(value);
        }
        buf
    }

    /// Decode one frame, `None` unless `bytes` is exactly [`RECORD_SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_SIZE {
            return None;
        }
        let session = SessionId::from_le_bytes([bytes[0], bytes[1]]);
        let mut values = [[0u8; ATTRIBUTE_VALUE_SIZE]; AttributeKind::COUNT];
        for (i, value) in values.iter_mut().enumerate() {
            let start = SESSION_ID_SIZE + i * ATTRIBUTE_VALUE_SIZE;
            value.copy_from_slice(&bytes[start..start + ATTRIBUTE_VALUE_SIZE]);
        }
        Some(Self { session, values })
    }
}
