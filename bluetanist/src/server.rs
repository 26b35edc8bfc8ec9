//! Attribute table the node exposes to its own clients.
//!
//! Every node serves the sensor data service. The master control service switches the
//! node between node and master role and, in master role, serves the aggregate of every
//! ready peer.

use bluetanist_types::attribute::AttributeKind;
use bluetanist_types::protocol::{MASTER_AGGREGATE_UUID, MASTER_SET_ROLE_UUID, Uuid128};
use embassy_time::Instant;
use heapless::Vec;

use crate::aggregate::SNAPSHOT_MAX_SIZE;
use crate::coordinator::Coordinator;
use crate::event::AttValue;
use crate::sensor::{SharedSensorData, read_sensor_data};
use crate::transport::{AttributeClient, LinkLayer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Advertise the sensor data service and wait for a master
    #[default]
    Node,
    /// Collect the sensor data of every other node
    Master,
}

impl Role {
    /// Decode a set-role write, `0` is node role and anything else master role
    pub fn from_value(value: u8) -> Self {
        match value {
            0 => Role::Node,
            _ => Role::Master,
        }
    }
}

/// Attribute protocol error returned to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttError {
    AttributeNotFound,
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidLength,
}

/// A client request on the local attribute table
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LocalRequest {
    Read { uuid: Uuid128 },
    Write { uuid: Uuid128, value: AttValue },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LocalResponse {
    Value(Vec<u8, SNAPSHOT_MAX_SIZE>),
    Written,
    Error(AttError),
}

pub struct LocalAttributeServer<'d> {
    sensor_data: &'d SharedSensorData,
    role: Role,
}

impl<'d> LocalAttributeServer<'d> {
    pub fn new(sensor_data: &'d SharedSensorData) -> Self {
        Self {
            sensor_data,
            role: Role::Node,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Put the node in `role`: master role coordinates the mesh, node role advertises
    pub fn apply_role<L: LinkLayer, G: AttributeClient>(
        &mut self,
        role: Role,
        coordinator: &mut Coordinator<'_, L, G>,
        now: Instant,
    ) {
        info!("Switching to {:?} role", role);
        self.role = role;
        match role {
            Role::Master => {
                if coordinator.is_active() {
                    return;
                }
                if let Err(e) = coordinator.start(now) {
                    error!("Failed to start coordination: {:?}", e);
                }
            }
            Role::Node => {
                coordinator.stop();
                if let Err(e) = coordinator.link_mut().start_advertising() {
                    error!("Failed to start advertising: {:?}", e);
                }
            }
        }
    }

    pub fn handle_request<L: LinkLayer, G: AttributeClient>(
        &mut self,
        request: LocalRequest,
        coordinator: &mut Coordinator<'_, L, G>,
        now: Instant,
    ) -> LocalResponse {
        let result = match request {
            LocalRequest::Read { uuid } => self.on_read(&uuid, coordinator, now).map(LocalResponse::Value),
            LocalRequest::Write { uuid, value } => self
                .on_write(&uuid, &value, coordinator, now)
                .map(|_| LocalResponse::Written),
        };
        result.unwrap_or_else(LocalResponse::Error)
    }

    /// Serve a read. The aggregate is empty outside master role, peers kept from an
    /// earlier master role aren't refreshed anymore.
    fn on_read<L: LinkLayer, G: AttributeClient>(
        &mut self,
        uuid: &Uuid128,
        coordinator: &mut Coordinator<'_, L, G>,
        now: Instant,
    ) -> Result<Vec<u8, SNAPSHOT_MAX_SIZE>, AttError> {
        if *uuid == MASTER_AGGREGATE_UUID {
            if self.role != Role::Master {
                debug!("Aggregate read in {:?} role", self.role);
                return Ok(Vec::new());
            }
            let snapshot = coordinator.build_snapshot();
            debug!("Aggregate read: {} peer(s)", snapshot.peer_count());
            if coordinator.config().refresh.on_aggregate_read {
                coordinator.refresh(now);
            }
            return Ok(snapshot.into_inner());
        }
        if *uuid == MASTER_SET_ROLE_UUID {
            return Err(AttError::ReadNotPermitted);
        }

        let kind = AttributeKind::from_uuid(uuid).ok_or(AttError::AttributeNotFound)?;
        let value = read_sensor_data(self.sensor_data).value(kind);
        let mut buf = Vec::new();
        buf.extend_from_slice(&value).map_err(|_| AttError::InvalidLength)?;
        Ok(buf)
    }

    fn on_write<L: LinkLayer, G: AttributeClient>(
        &mut self,
        uuid: &Uuid128,
        value: &[u8],
        coordinator: &mut Coordinator<'_, L, G>,
        now: Instant,
    ) -> Result<(), AttError> {
        if *uuid == MASTER_SET_ROLE_UUID {
            let [role] = value else {
                return Err(AttError::InvalidLength);
            };
            self.apply_role(Role::from_value(*role), coordinator, now);
            return Ok(());
        }
        if *uuid == MASTER_AGGREGATE_UUID || AttributeKind::from_uuid(uuid).is_some() {
            return Err(AttError::WriteNotPermitted);
        }
        Err(AttError::AttributeNotFound)
    }
}
