//! The node's own sensor readings.
//!
//! A producer task samples the sensors on its own schedule and stores the latest record,
//! the local attribute server reads it when a peer asks for a value. Both sides only
//! hold the lock for the copy.

use core::cell::Cell;
use core::fmt::Debug;

use bluetanist_types::sensor::SensorData;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::{Duration, Timer};

use crate::RawMutex;

/// Latest sensor record shared between the producer and the attribute server
pub type SharedSensorData = Mutex<RawMutex, Cell<SensorData>>;

pub fn read_sensor_data(shared: &SharedSensorData) -> SensorData {
    shared.lock(|data| data.get())
}

pub fn write_sensor_data(shared: &SharedSensorData, data: SensorData) {
    shared.lock(|cell| cell.set(data));
}

/// The sensor hardware of a node.
#[allow(async_fn_in_trait)]
pub trait SensorReader {
    type Error: Debug;

    /// Sample every sensor once
    async fn read(&mut self) -> Result<SensorData, Self::Error>;
}

/// Sample `reader` every `interval` and publish the result to `shared`.
///
/// A failed sample keeps the previous record.
pub async fn run_sensor_producer<R: SensorReader>(reader: &mut R, shared: &SharedSensorData, interval: Duration) -> ! {
    loop {
        sample_once(reader, shared).await;
        Timer::after(interval).await;
    }
}

pub(crate) async fn sample_once<R: SensorReader>(reader: &mut R, shared: &SharedSensorData) {
    match reader.read().await {
        Ok(data) => {
            trace!("Sensor data: {:?}", data);
            write_sensor_data(shared, data);
        }
        Err(e) => {
            #[cfg(feature = "defmt")]
            let e = defmt::Debug2Format(&e);
            warn!("Reading sensors failed: {:?}", e);
        }
    }
}
