//! Recording decision sink for integration tests.
//!
//! Captures every emitted event so tests can assert on the full decision
//! history rather than just the final state.

use climacore::app::events::EngineEvent;
use climacore::app::ports::DecisionSink;
use climacore::clock::Timestamp;
use climacore::occupancy::OccupancyState;
use climacore::vent::FanSpeed;

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<EngineEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Speed of the most recently emitted ventilation decision.
    pub fn last_vent_speed(&self) -> Option<FanSpeed> {
        self.events.iter().rev().find_map(|e| match e {
            EngineEvent::Ventilation { decision, .. } => Some(decision.speed),
            _ => None,
        })
    }

    /// Every emitted (speed, reason) in order.
    pub fn vent_history(&self) -> Vec<(FanSpeed, String)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Ventilation { decision, .. } => {
                    Some((decision.speed, decision.reason.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Every occupancy flip in order.
    pub fn occupancy_history(&self) -> Vec<(OccupancyState, OccupancyState)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Occupancy(c) => Some((c.from, c.to)),
                _ => None,
            })
            .collect()
    }

    /// Latest heating decision (suspended flag and reason).
    pub fn last_heating(&self) -> Option<(bool, String)> {
        self.events.iter().rev().find_map(|e| match e {
            EngineEvent::Heating { decision, .. } => {
                Some((decision.suspended, decision.reason.clone()))
            }
            _ => None,
        })
    }

    /// Resolved spike peaks, in order.
    pub fn spike_peaks(&self) -> Vec<f32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::SpikeResolved { peak, .. } => Some(*peak),
                _ => None,
            })
            .collect()
    }

    pub fn timestamps_of_vent_changes(&self) -> Vec<Timestamp> {
        self.events
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Ventilation { at, .. } => Some(*at),
                _ => None,
            })
            .collect()
    }
}

impl DecisionSink for RecordingSink {
    fn emit(&mut self, event: &EngineEvent) {
        self.events.push(event.clone());
    }
}
