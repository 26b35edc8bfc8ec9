//! # BlueTanist
//!
//! Discovery, connection and attribute aggregation for BlueTanist sensor mesh nodes.
//!
//! A node in master role scans for other nodes, connects to them one at a time, walks
//! their sensor data service and reads every sensor attribute. The results are kept in a
//! bounded peer store and serialized on demand into the aggregate buffer the master
//! exposes to its own client.
//!
//! The radio and attribute transports are external: they are driven through the
//! [`transport::LinkLayer`] and [`transport::AttributeClient`] traits, and report back by
//! sending [`event::MeshEvent`]s to [`channel::MESH_EVENT_CHANNEL`]. Everything else runs
//! on the single dispatch context of [`runner::run_mesh`].
//!
//! ## Feature flags
#![doc = document_features::document_features!()]
#![no_std]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod aggregate;
pub mod channel;
pub mod config;
pub mod coordinator;
mod discovery;
pub mod error;
pub mod event;
pub mod ledger;
pub mod peer;
pub mod runner;
pub mod sensor;
pub mod server;
pub mod transport;

pub use bluetanist_types as types;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

// Capacities generated from the optional mesh config file
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

/// Raw mutex used by every channel, signal and shared record of the crate
pub type RawMutex = CriticalSectionRawMutex;
