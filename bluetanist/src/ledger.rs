//! Attributes discovered on one peer connection.

use bluetanist_types::attribute::{AttributeKind, AttributeValue};
use heapless::Vec;

use crate::error::MeshError;

/// Validity of a cached attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Validity {
    /// No read of this attribute has succeeded yet
    NeverRead,
    /// The cached value was read before, a newer one has been requested or failed
    Stale,
    /// The cached value is the result of the latest read
    Fresh,
}

/// One sensor attribute of a peer, bound to the value handle of the current connection.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeEntry {
    kind: AttributeKind,
    handle: u16,
    value: AttributeValue,
    validity: Validity,
    /// Consecutive failed reads
    failed_reads: u8,
}

impl AttributeEntry {
    pub fn new(kind: AttributeKind, handle: u16) -> Self {
        Self {
            kind,
            handle,
            value: [0; 2],
            validity: Validity::NeverRead,
            failed_reads: 0,
        }
    }

    pub fn kind(&self) -> AttributeKind {
        self.kind
    }

    pub fn handle(&self) -> u16 {
        self.handle
    }

    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// Cached value, `None` until a read has succeeded
    pub fn value(&self) -> Option<AttributeValue> {
        match self.validity {
            Validity::NeverRead => None,
            _ => Some(self.value),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.validity == Validity::Fresh
    }

    pub fn failed_reads(&self) -> u8 {
        self.failed_reads
    }

    /// Store a successfully read value
    pub fn upsert_value(&mut self, value: AttributeValue) {
        self.value = value;
        self.validity = Validity::Fresh;
        self.failed_reads = 0;
    }

    /// Keep the cached value but stop treating it as current
    pub(crate) fn mark_stale(&mut self) {
        if self.validity == Validity::Fresh {
            self.validity = Validity::Stale;
        }
    }

    /// Record a failed read, returns the number of consecutive failures
    pub(crate) fn record_failure(&mut self) -> u8 {
        self.mark_stale();
        self.failed_reads = self.failed_reads.saturating_add(1);
        self.failed_reads
    }
}

/// Ordered list of the attributes discovered on a peer.
///
/// At most one entry per attribute kind, so lookups are plain linear scans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeLedger {
    entries: Vec<AttributeEntry, { AttributeKind::COUNT }>,
}

impl AttributeLedger {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeEntry> {
        self.entries.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut AttributeEntry> {
        self.entries.iter_mut()
    }

    pub fn find_by_handle(&self, handle: u16) -> Option<&AttributeEntry> {
        self.entries.iter().find(|e| e.handle == handle)
    }

    pub(crate) fn find_by_handle_mut(&mut self, handle: u16) -> Option<&mut AttributeEntry> {
        self.entries.iter_mut().find(|e| e.handle == handle)
    }

    pub fn find_by_kind(&self, kind: AttributeKind) -> Option<&AttributeEntry> {
        self.entries.iter().find(|e| e.kind == kind)
    }

    /// Get the entry of `kind`, creating it when it's missing.
    ///
    /// An existing entry bound to a different handle is replaced by a fresh one, since its
    /// cached value belongs to the old binding.
    pub fn find_or_create(&mut self, kind: AttributeKind, handle: u16) -> Result<&mut AttributeEntry, MeshError> {
        match self.entries.iter().position(|e| e.kind == kind) {
            Some(index) => {
                let entry = &mut self.entries[index];
                if entry.handle != handle {
                    debug!("Rebinding {:?} from handle {} to {}", kind, entry.handle, handle);
                    *entry = AttributeEntry::new(kind, handle);
                }
                Ok(entry)
            }
            None => {
                self.entries
                    .push(AttributeEntry::new(kind, handle))
                    .map_err(|_| MeshError::AttributeCapacity)?;
                let last = self.entries.len() - 1;
                Ok(&mut self.entries[last])
            }
        }
    }

    /// Store `value` on the entry bound to `handle`, returns false if there's none
    pub fn upsert_value(&mut self, handle: u16, value: AttributeValue) -> bool {
        match self.find_by_handle_mut(handle) {
            Some(entry) => {
                entry.upsert_value(value);
                true
            }
            None => false,
        }
    }

    /// Whether every sensor attribute has been read successfully at least once
    pub fn is_complete(&self) -> bool {
        AttributeKind::ALL
            .iter()
            .all(|kind| self.find_by_kind(*kind).is_some_and(|e| e.value().is_some()))
    }

    /// Cached values in canonical attribute order, `None` unless the ledger is complete
    pub fn values(&self) -> Option<[AttributeValue; AttributeKind::COUNT]> {
        let mut values = [[0u8; 2]; AttributeKind::COUNT];
        for kind in AttributeKind::ALL {
            values[kind.index()] = self.find_by_kind(kind)?.value()?;
        }
        Some(values)
    }
}
