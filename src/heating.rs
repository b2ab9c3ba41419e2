//! Heating coordinator.
//!
//! Keeps the heat pump from fighting the ERV: while the room is
//! unoccupied and ventilating, heating warm air straight into the
//! exhaust stream is wasted energy, so heating is suspended until the
//! purge ends, someone returns, or the room gets genuinely cold.
//!
//! Also owns the comfort heat-band: pause heat at the upper band
//! temperature, resume at the lower one, with the away-mode coordination
//! rules layered on top.  All commands are idempotent — the coordinator
//! only emits a decision when the suspended state actually flips.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SystemConfig;
use crate::occupancy::OccupancyState;
use crate::vent::FanSpeed;

// ---------------------------------------------------------------------------
// HVAC status types
// ---------------------------------------------------------------------------

/// Operating mode reported by the HVAC adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Heat,
    Cool,
    Off,
    Auto,
}

/// Hour-of-day window during which automatic heat resumption is allowed.
/// Wraps around midnight when `start_hour > end_hour`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyHours {
    /// Start hour (0–23 inclusive).
    pub start_hour: u8,
    /// End hour (0–23 inclusive, exclusive bound).
    pub end_hour: u8,
}

impl OccupancyHours {
    /// Check whether `hour` falls inside the window.
    pub fn contains(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            // e.g. 22..6 — wraps around midnight.
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

/// One heating decision for the HVAC executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatingDecision {
    pub suspended: bool,
    pub reason: String,
}

impl HeatingDecision {
    fn suspend(reason: impl Into<String>) -> Self {
        Self {
            suspended: true,
            reason: reason.into(),
        }
    }

    fn resume(reason: impl Into<String>) -> Self {
        Self {
            suspended: false,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Comfort heat-band helper
// ---------------------------------------------------------------------------

/// What the comfort band wants done, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatBandAction {
    Pause,
    Resume,
}

/// Inputs to the comfort-band decision, gathered by the caller.
#[derive(Debug, Clone, Copy)]
pub struct HeatBandInputs {
    pub temp_c: Option<f32>,
    pub hvac_mode: HvacMode,
    pub band_paused: bool,
    pub occupancy: OccupancyState,
    pub erv_running: bool,
    pub min_temp_c: f32,
    pub within_occupancy_hours: bool,
    pub heat_off_temp_c: f32,
    pub heat_on_temp_c: f32,
}

/// Decide whether heat should be paused or resumed for the comfort band.
///
/// Resumption while away defers to the ventilation coordination rules:
/// never resume under a running ERV in a warm room, never outside
/// occupancy hours.
pub fn heat_band_action(p: &HeatBandInputs) -> Option<HeatBandAction> {
    let temp = p.temp_c?;

    if p.hvac_mode == HvacMode::Heat && temp >= p.heat_off_temp_c {
        return Some(HeatBandAction::Pause);
    }

    if !(p.band_paused && p.hvac_mode == HvacMode::Off && temp <= p.heat_on_temp_c) {
        return None;
    }

    if p.occupancy == OccupancyState::Away {
        if p.erv_running && temp > p.min_temp_c {
            return None;
        }
        if !p.within_occupancy_hours {
            return None;
        }
    }

    Some(HeatBandAction::Resume)
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Tracks the suspended/paused state and emits idempotent commands.
/// Holds no timers of its own — it is driven entirely by upstream events.
#[derive(Debug, Default)]
pub struct HeatingCoordinator {
    suspended: bool,
    band_paused: bool,
}

impl HeatingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether heating is currently held off (either reason).
    pub fn suspended(&self) -> bool {
        self.suspended || self.band_paused
    }

    /// Re-apply persisted state after a restart.
    pub fn restore(&mut self, suspended: bool, band_paused: bool) {
        self.suspended = suspended;
        self.band_paused = band_paused;
    }

    pub fn band_paused(&self) -> bool {
        self.band_paused
    }

    /// The away-coordination suspension alone, without the comfort band.
    pub fn away_suspended(&self) -> bool {
        self.suspended
    }

    /// Re-evaluate against the latest state.  Returns a decision only
    /// when the heating command actually changes.
    #[allow(clippy::too_many_arguments)]
    pub fn evaluate(
        &mut self,
        occupancy: OccupancyState,
        vent_speed: FanSpeed,
        temp_c: Option<f32>,
        hvac_mode: HvacMode,
        hour: u8,
        heat_forced: bool,
        hvac_override_active: bool,
        config: &SystemConfig,
    ) -> Option<HeatingDecision> {
        // Absolute floor: always heat, even under an operator override.
        if heat_forced {
            if self.suspended || self.band_paused {
                self.suspended = false;
                self.band_paused = false;
                info!("heating resumed: below critical floor");
                return Some(HeatingDecision::resume(
                    "indoor temperature below critical floor",
                ));
            }
            return None;
        }

        // The operator owns the unit while an HVAC override is active.
        if hvac_override_active {
            return None;
        }

        let Some(temp) = temp_c else {
            warn!("no indoor temperature reading; heating decision held");
            return None;
        };
        let within_hours = config.occupancy_hours.contains(hour);

        // Away coordination: do not heat air about to be exhausted.
        if occupancy == OccupancyState::Away
            && vent_speed.is_running()
            && temp > config.min_heat_suspend_temp_c
        {
            if self.suspended {
                return None;
            }
            self.suspended = true;
            return Some(HeatingDecision::suspend(format!(
                "away ventilation running at {temp:.1}°C"
            )));
        }

        if self.suspended {
            if occupancy == OccupancyState::Present {
                self.suspended = false;
                return Some(HeatingDecision::resume("room occupied"));
            }
            if !vent_speed.is_running() && within_hours {
                self.suspended = false;
                return Some(HeatingDecision::resume(
                    "ventilation stopped within occupancy hours",
                ));
            }
            if temp <= config.min_heat_suspend_temp_c {
                self.suspended = false;
                return Some(HeatingDecision::resume(format!(
                    "temperature {temp:.1}°C at suspend floor"
                )));
            }
            return None;
        }

        // Comfort band.
        let action = heat_band_action(&HeatBandInputs {
            temp_c: Some(temp),
            hvac_mode,
            band_paused: self.band_paused,
            occupancy,
            erv_running: vent_speed.is_running(),
            min_temp_c: config.min_heat_suspend_temp_c,
            within_occupancy_hours: within_hours,
            heat_off_temp_c: config.heat_off_temp_c,
            heat_on_temp_c: config.heat_on_temp_c,
        });
        match action {
            Some(HeatBandAction::Pause) => {
                self.band_paused = true;
                Some(HeatingDecision::suspend(format!(
                    "comfort band upper bound reached ({temp:.1}°C)"
                )))
            }
            Some(HeatBandAction::Resume) => {
                self.band_paused = false;
                Some(HeatingDecision::resume(format!(
                    "comfort band lower bound reached ({temp:.1}°C)"
                )))
            }
            None => None,
        }
    }
}
