//! Exposed channels connecting the transports and the local attribute server to the dispatcher

use core::cell::Cell;

use bluetanist_types::sensor::SensorData;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
pub use embassy_sync::{blocking_mutex, channel, signal};

use crate::event::MeshEvent;
use crate::sensor::SharedSensorData;
use crate::server::{LocalRequest, LocalResponse};
use crate::{EVENT_CHANNEL_SIZE, LOCAL_REQUEST_CHANNEL_SIZE, RawMutex};

/// Channel for link layer and attribute transport events
pub static MESH_EVENT_CHANNEL: Channel<RawMutex, MeshEvent, EVENT_CHANNEL_SIZE> = Channel::new();
/// Channel for requests to the node's own attribute table
pub static LOCAL_REQUEST_CHANNEL: Channel<RawMutex, LocalRequest, LOCAL_REQUEST_CHANNEL_SIZE> = Channel::new();
/// Response to the request taken from [`LOCAL_REQUEST_CHANNEL`]
pub static LOCAL_RESPONSE: Signal<RawMutex, LocalResponse> = Signal::new();
// Keeps one local request in flight, so that a response can't be taken by another requester
pub(crate) static LOCAL_REQUEST_MUTEX: Mutex<RawMutex, ()> = Mutex::new(());
/// Latest readings of the node's own sensors
pub static SENSOR_DATA: SharedSensorData = blocking_mutex::Mutex::new(Cell::new(SensorData::from_readings(0, 0, 0)));

/// Forward a transport event to the dispatcher, waiting for room in the channel
pub async fn send_mesh_event(event: MeshEvent) {
    MESH_EVENT_CHANNEL.send(event).await;
}

/// Forward a transport event from a context that can't wait, e.g. a radio callback.
///
/// The event is dropped when the channel is full.
pub fn try_send_mesh_event(event: MeshEvent) {
    if let Err(e) = MESH_EVENT_CHANNEL.try_send(event) {
        warn!("Mesh event channel full, dropping {:?}", e);
    }
}
