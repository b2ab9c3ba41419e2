//! Present/Away occupancy state machine.
//!
//! Fuses door contact, motion, and workstation-activity signals into a
//! two-state occupancy model.  The door-change timestamp is the single
//! source of truth that filters out "walking toward the door" false
//! presence: activity only counts when it is **newer** than the last door
//! change.
//!
//! ```text
//!                  activity/motion newer than door change
//!          ┌──────────────────────────────────────────────┐
//!          │                                              ▼
//!        AWAY                                          PRESENT
//!          ▲                                              │
//!          │   door open→close + quiet verification       │
//!          └──────────────────────────────────────────────┘
//!
//!  Door open ≥ 5 min ⇒ door-open mode: presence on any activity,
//!  departure on sustained inactivity instead of door sequences.
//! ```
//!
//! Door-open mode exists because a door left open for fresh air would
//! otherwise be indistinguishable from "about to leave", causing
//! false-departure flapping.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::{TimerKey, TimerService, Timestamp};
use crate::config::SystemConfig;
use crate::events::AirQualityReading;

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

/// Binary occupancy state driving quiet-vs-aggressive ventilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyState {
    Present,
    Away,
}

impl core::fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Present => write!(f, "present"),
            Self::Away => write!(f, "away"),
        }
    }
}

/// Emitted whenever the occupancy state flips.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OccupancyChange {
    pub from: OccupancyState,
    pub to: OccupancyState,
    pub at: Timestamp,
}

/// Latest accepted reading from every sensor.
///
/// All `*_last_*` timestamps are monotonically non-decreasing; the one
/// exception is the explicit reset of the activity marks on a confirmed
/// departure, which exists so stale pre-departure activity cannot
/// re-satisfy the presence predicate.
#[derive(Debug, Clone, Copy)]
pub struct SensorState {
    pub door_open: bool,
    pub door_last_changed: Timestamp,
    pub window_open: bool,
    pub window_last_changed: Timestamp,
    pub motion_last_seen: Option<Timestamp>,
    pub mac_last_active: Option<Timestamp>,
    pub external_monitor_connected: bool,
    pub co2_ppm: Option<f32>,
    pub tvoc_index: Option<f32>,
    pub temp_c: Option<f32>,
    pub humidity: Option<f32>,
    pub air_updated: Option<Timestamp>,
}

impl SensorState {
    /// Fresh state at process start: door and window assumed closed until
    /// the first contact report says otherwise.
    pub fn new(at: Timestamp) -> Self {
        Self {
            door_open: false,
            door_last_changed: at,
            window_open: false,
            window_last_changed: at,
            motion_last_seen: None,
            mac_last_active: None,
            external_monitor_connected: false,
            co2_ppm: None,
            tvoc_index: None,
            temp_c: None,
            humidity: None,
            air_updated: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// The occupancy state machine.  Owns the sensor state and the two-state
/// model; downstream engines read both through accessors.
pub struct OccupancyTracker {
    state: OccupancyState,
    door_open_mode: bool,
    sensors: SensorState,
}

impl OccupancyTracker {
    /// Start from `initial` (restored externally) at `at`.
    pub fn new(initial: OccupancyState, at: Timestamp) -> Self {
        Self {
            state: initial,
            door_open_mode: false,
            sensors: SensorState::new(at),
        }
    }

    pub fn state(&self) -> OccupancyState {
        self.state
    }

    pub fn door_open_mode(&self) -> bool {
        self.door_open_mode
    }

    pub fn sensors(&self) -> &SensorState {
        &self.sensors
    }

    /// Re-apply persisted state after a restart.  Re-arms the door-open
    /// mode entry timer if the door was already open when we went down.
    pub fn restore(
        &mut self,
        state: OccupancyState,
        door_open_mode: bool,
        now: Timestamp,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) {
        self.state = state;
        self.door_open_mode = door_open_mode;
        if door_open_mode && state == OccupancyState::Present {
            timers.arm(
                TimerKey::DoorOpenAway,
                now.plus_secs(f64::from(config.door_open_away_timeout_secs)),
            );
        }
        info!("occupancy restored: {state}, door-open mode {door_open_mode}");
    }

    // ── Event intake ──────────────────────────────────────────────

    /// Door contact changed.
    pub fn handle_door(
        &mut self,
        open: bool,
        at: Timestamp,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) -> Option<OccupancyChange> {
        if at < self.sensors.door_last_changed {
            debug!(
                "door event at {:.1} older than {:.1}, dropped",
                at.0, self.sensors.door_last_changed.0
            );
            return None;
        }
        if open == self.sensors.door_open {
            debug!("duplicate door report (open={open}), ignored");
            return None;
        }

        self.sensors.door_open = open;
        self.sensors.door_last_changed = at;

        if open {
            // A reopening door voids any pending departure confirmation.
            timers.cancel(TimerKey::DepartureVerification);
            timers.arm(
                TimerKey::DoorOpenModeEntry,
                at.plus_secs(f64::from(config.door_open_mode_entry_secs)),
            );
            return None;
        }

        // Door closed.
        timers.cancel(TimerKey::DoorOpenModeEntry);

        if self.door_open_mode {
            // Back to the normal regime; the inactivity countdown dies
            // with the mode.
            self.door_open_mode = false;
            timers.cancel(TimerKey::DoorOpenAway);
            info!("door closed, exiting door-open mode");
            return None;
        }

        if self.state == OccupancyState::Present {
            // Possible departure: confirm after a quiet window.
            timers.arm(
                TimerKey::DepartureVerification,
                at.plus_secs(f64::from(config.departure_verification_secs)),
            );
        }
        None
    }

    /// Window contact changed.  Windows never affect occupancy, only the
    /// ventilation interlock.
    pub fn handle_window(&mut self, open: bool, at: Timestamp) {
        if at < self.sensors.window_last_changed {
            debug!("window event at {:.1} out of order, dropped", at.0);
            return;
        }
        self.sensors.window_open = open;
        self.sensors.window_last_changed = at;
    }

    /// Motion sensor pulse.
    pub fn handle_motion(
        &mut self,
        at: Timestamp,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) -> Option<OccupancyChange> {
        if self
            .sensors
            .motion_last_seen
            .is_some_and(|prev| at < prev)
        {
            debug!("motion event at {:.1} out of order, dropped", at.0);
            return None;
        }
        self.sensors.motion_last_seen = Some(at);
        self.on_activity_signal(at, timers, config)
    }

    /// Workstation activity report.
    pub fn handle_activity(
        &mut self,
        last_active: Timestamp,
        external_monitor: bool,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) -> Option<OccupancyChange> {
        if self
            .sensors
            .mac_last_active
            .is_some_and(|prev| last_active < prev)
        {
            debug!("activity report at {:.1} out of order, dropped", last_active.0);
            return None;
        }
        self.sensors.mac_last_active = Some(last_active);
        self.sensors.external_monitor_connected = external_monitor;
        self.on_activity_signal(last_active, timers, config)
    }

    /// Air-monitor reading.  Returns `false` when dropped as out of order.
    pub fn update_air(&mut self, reading: &AirQualityReading) -> bool {
        if self.sensors.air_updated.is_some_and(|prev| reading.at < prev) {
            debug!("air reading at {:.1} out of order, dropped", reading.at.0);
            return false;
        }
        self.sensors.air_updated = Some(reading.at);
        if let Some(v) = reading.co2_ppm {
            self.sensors.co2_ppm = Some(v);
        }
        if let Some(v) = reading.tvoc_index {
            self.sensors.tvoc_index = Some(v);
        }
        if let Some(v) = reading.temp_c {
            self.sensors.temp_c = Some(v);
        }
        if let Some(v) = reading.humidity {
            self.sensors.humidity = Some(v);
        }
        true
    }

    /// A timer owned by this machine came due.
    pub fn handle_timer(
        &mut self,
        key: TimerKey,
        now: Timestamp,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) -> Option<OccupancyChange> {
        match key {
            TimerKey::DepartureVerification => {
                if self.state == OccupancyState::Present
                    && !self.door_open_mode
                    && !self.presence_signal()
                {
                    // Confirmed departure.  Clear the activity marks so
                    // stale pre-departure signals cannot re-satisfy the
                    // presence predicate once the clock moves on.
                    self.sensors.mac_last_active = None;
                    self.sensors.motion_last_seen = None;
                    return Some(self.transition(OccupancyState::Away, now));
                }
                debug!("departure verification lapsed, presence re-established");
                None
            }
            TimerKey::DoorOpenModeEntry => {
                if self.sensors.door_open && !self.door_open_mode {
                    self.door_open_mode = true;
                    info!("door open past threshold, entering door-open mode");
                    if self.state == OccupancyState::Present {
                        timers.arm(
                            TimerKey::DoorOpenAway,
                            now.plus_secs(f64::from(config.door_open_away_timeout_secs)),
                        );
                    }
                }
                None
            }
            TimerKey::DoorOpenAway => {
                if self.door_open_mode && self.state == OccupancyState::Present {
                    return Some(self.transition(OccupancyState::Away, now));
                }
                None
            }
            // Other keys belong to the ventilation/override layer.
            _ => None,
        }
    }

    // ── Predicates ────────────────────────────────────────────────

    /// Normal-regime presence predicate.  Door opening alone, or a
    /// connected monitor alone, never satisfies it.
    pub fn presence_signal(&self) -> bool {
        let s = &self.sensors;
        let workstation = s.external_monitor_connected
            && s.mac_last_active.is_some_and(|t| t > s.door_last_changed);
        let motion =
            !s.door_open && s.motion_last_seen.is_some_and(|t| t > s.door_last_changed);
        workstation || motion
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Shared arrival path for motion pulses and activity reports.
    fn on_activity_signal(
        &mut self,
        at: Timestamp,
        timers: &mut TimerService,
        config: &SystemConfig,
    ) -> Option<OccupancyChange> {
        if self.door_open_mode {
            // Every qualifying event (re)starts the inactivity countdown.
            timers.arm(
                TimerKey::DoorOpenAway,
                at.plus_secs(f64::from(config.door_open_away_timeout_secs)),
            );
            return match self.state {
                OccupancyState::Present => None,
                // Any activity means someone is here; no door-event
                // prerequisite in this regime.
                OccupancyState::Away => Some(self.transition(OccupancyState::Present, at)),
            };
        }

        match self.state {
            OccupancyState::Away if self.presence_signal() => {
                Some(self.transition(OccupancyState::Present, at))
            }
            OccupancyState::Present => {
                if timers.pending(TimerKey::DepartureVerification).is_some()
                    && self.presence_signal()
                {
                    // Activity re-established presence inside the window.
                    timers.cancel(TimerKey::DepartureVerification);
                }
                None
            }
            OccupancyState::Away => None,
        }
    }

    fn transition(&mut self, to: OccupancyState, at: Timestamp) -> OccupancyChange {
        let from = self.state;
        self.state = to;
        info!("occupancy: {from} -> {to}");
        OccupancyChange { from, to, at }
    }
}
