//! Test infrastructure for the persistence layer.
//!
//! Shared fixtures (a small real-estate catalog, backends, provisioners) and
//! a fault-injecting store wrapper for provisioning failure tests.

#![allow(dead_code)]

pub mod faults;
pub mod fixtures;

pub use faults::*;
pub use fixtures::*;
