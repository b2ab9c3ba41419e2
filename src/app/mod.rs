//! Application core — pure domain logic, zero I/O.
//!
//! This module wires the occupancy machine, spike detector, ventilation
//! engine, and heating coordinator into one single-writer pipeline.  All
//! interaction with the outside world happens through typed inbound
//! events, validated commands, and the [`DecisionSink`](ports::DecisionSink)
//! port, keeping the whole layer testable without any real device.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
