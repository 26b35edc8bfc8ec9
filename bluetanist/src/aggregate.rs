//! Aggregate buffer the master exposes to its own client.

use bluetanist_types::record::{AggregateRecord, RECORD_SIZE};
use heapless::Vec;

use crate::MAX_PEERS;
use crate::peer::PeerStore;

/// Size of the aggregate buffer when every tracked peer is ready
pub const SNAPSHOT_MAX_SIZE: usize = MAX_PEERS * RECORD_SIZE;

/// Serialized records of every ready peer.
///
/// The length is always `ready peers × RECORD_SIZE`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    buf: Vec<u8, SNAPSHOT_MAX_SIZE>,
}

impl Snapshot {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn peer_count(&self) -> usize {
        self.buf.len() / RECORD_SIZE
    }

    /// Decode the records back, in the order they were written
    pub fn records(&self) -> impl Iterator<Item = AggregateRecord> + '_ {
        self.buf.chunks_exact(RECORD_SIZE).filter_map(AggregateRecord::from_bytes)
    }

    pub fn into_inner(self) -> Vec<u8, SNAPSHOT_MAX_SIZE> {
        self.buf
    }
}

/// Serialize every ready peer, in store iteration order.
///
/// Peers that aren't ready are left out entirely.
pub fn build_snapshot(store: &PeerStore) -> Snapshot {
    let mut buf = Vec::new();
    for record in store.ready_peers().filter_map(|p| p.aggregate_record()) {
        // The store can't hold more peers than the buffer has records
        if buf.extend_from_slice(&record.to_bytes()).is_err() {
            break;
        }
    }
    Snapshot { buf }
}
