//! Outbound application events.
//!
//! The [`ClimateService`](super::service::ClimateService) emits these
//! through the [`DecisionSink`](super::ports::DecisionSink) port.
//! Adapters on the other side decide what to do with them — apply the
//! decision to the real device, append to the durable action log,
//! broadcast to dashboard clients.

use serde::Serialize;

use crate::clock::Timestamp;
use crate::heating::HeatingDecision;
use crate::occupancy::{OccupancyChange, OccupancyState};
use crate::spike::SpikePhase;
use crate::vent::{FanSpeed, VentilationDecision};

/// Structured events emitted by the decision core.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Occupancy flipped.
    Occupancy(OccupancyChange),

    /// The ERV should change speed.
    Ventilation {
        at: Timestamp,
        decision: VentilationDecision,
    },

    /// Heating should be suspended or resumed.
    Heating {
        at: Timestamp,
        decision: HeatingDecision,
    },

    /// A VOC spike resolved and clearing ventilation begins.
    SpikeResolved { at: Timestamp, peak: f32 },
}

/// A point-in-time status summary for the dashboard adapter.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub occupancy: OccupancyState,
    pub door_open_mode: bool,
    pub door_open: bool,
    pub window_open: bool,
    pub co2_ppm: Option<f32>,
    pub tvoc_index: Option<f32>,
    pub temp_c: Option<f32>,
    pub humidity: Option<f32>,
    pub fan_speed: FanSpeed,
    pub spike_phase: SpikePhase,
    pub heating_suspended: bool,
    pub erv_override_active: bool,
    pub hvac_override_active: bool,
    pub interlock_flags: u8,
    pub events_processed: u64,
}
