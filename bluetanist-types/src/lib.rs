//! # BlueTanist Types
//!
//! This crate provides the protocol vocabulary shared by every BlueTanist node.
//!
//! ## Modules
//!
//! - [`address`] - Link addresses and transport session identifiers
//! - [`protocol`] - 128-bit service/characteristic identifiers and the advertised node marker
//! - [`attribute`] - Sensor attribute kinds and their canonical order
//! - [`sensor`] - The local sensor record exposed by every node
//! - [`record`] - Layout of one peer record in the master's aggregate buffer
//!
//! The identifiers in [`protocol`] are what existing nodes advertise and expose,
//! so they must never change.

#![no_std]

pub mod address;
pub mod attribute;
pub mod protocol;
pub mod record;
pub mod sensor;
