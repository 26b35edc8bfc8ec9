use crate::transport::TransportError;

/// Failure of a single coordinator operation.
///
/// These never leave the dispatch context, they are logged where the event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshError {
    /// The peer store is full
    PeerCapacity,
    /// The peer's attribute ledger is full
    AttributeCapacity,
    /// No room left to schedule a read retry
    RetryQueueFull,
    /// A node kept the radio busy for longer than the retry budget
    RetriesExhausted,
    Transport(TransportError),
}

impl From<TransportError> for MeshError {
    fn from(e: TransportError) -> Self {
        MeshError::Transport(e)
    }
}
