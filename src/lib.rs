//! Occupancy-driven climate decision core.
//!
//! Fuses noisy, asynchronous sensor signals (door/window contacts,
//! motion, workstation activity, CO2, tVOC) into a Present/Away
//! occupancy model and derives ERV fan-speed and heating-suspend
//! decisions — with hysteresis, a multi-phase away ramp, and a
//! delta-based odor spike detector.
//!
//! The crate is a pure decision function wrapped by adapters: it
//! consumes typed events, emits typed decisions with human-readable
//! reasons, and owns no transport, persistence, or device I/O.

#![deny(unused_must_use)]

pub mod app;
pub mod clock;
pub mod config;
pub mod events;
pub mod heating;
pub mod occupancy;
pub mod safety;
pub mod snapshot;
pub mod spike;
pub mod vent;

mod error;
pub use error::{CommandError, Error, EventError, Result, SnapshotError};
