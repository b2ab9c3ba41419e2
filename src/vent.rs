//! Ventilation decision engine.
//!
//! Turns (occupancy, air quality, spike state, interlocks, overrides)
//! into an ERV fan-speed decision.  Rules are evaluated top-down, first
//! match wins, and the whole chain is re-run from scratch on every event
//! so decisions are idempotent:
//!
//! 1. contact interlock (door/window open) — beats everything
//! 2. manual override
//! 3. spike clearing
//! 4. absolute tVOC threshold
//! 5. occupied: CO2 hysteresis band (quiet operation bias)
//! 6. away: forced turbo, then fall-rate adaptive ramp, then plateau
//!
//! The occupied-mode rule is a classic hysteresis band: the decision
//! depends on the current run state as well as the reading, so a trace
//! oscillating just under the trigger level can never chatter the fan.

use heapless::Deque;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::config::SystemConfig;
use crate::occupancy::{OccupancyState, SensorState};
use crate::spike::SpikeDetector;

/// Trailing CO2 samples kept while away (readings arrive about once a
/// minute; the rate window needs 15 of them).
pub const CO2_HISTORY_SAMPLES: usize = 32;

// ---------------------------------------------------------------------------
// Fan speed
// ---------------------------------------------------------------------------

/// ERV fan speed presets, ordered by aggressiveness.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Off,
    /// Minimal noise — the only level tolerable while working.
    Quiet,
    /// Slight positive pressure; handles odors.
    Medium,
    /// Full purge.
    Turbo,
}

impl FanSpeed {
    /// (supply, exhaust) fan registers for the ERV, range 0–8.
    pub const fn registers(self) -> (u8, u8) {
        match self {
            Self::Off => (0, 0),
            Self::Quiet => (1, 1),
            Self::Medium => (3, 2),
            Self::Turbo => (8, 8),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Quiet => "quiet",
            Self::Medium => "medium",
            Self::Turbo => "turbo",
        }
    }

    pub const fn is_running(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl core::fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ventilation decision, with the reasoning spelled out for the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VentilationDecision {
    pub speed: FanSpeed,
    pub reason: String,
    /// Set when the decision came from a manual override.
    pub expires_at: Option<Timestamp>,
}

impl VentilationDecision {
    fn new(speed: FanSpeed, reason: impl Into<String>) -> Self {
        Self {
            speed,
            reason: reason.into(),
            expires_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Away-mode bookkeeping
// ---------------------------------------------------------------------------

/// State that exists only between a departure and the next arrival.
#[derive(Debug)]
struct AwayState {
    entered_at: Timestamp,
    co2_history: Deque<(Timestamp, f32), CO2_HISTORY_SAMPLES>,
    plateau_candidate_since: Option<Timestamp>,
    plateau_reached: bool,
    flush_active_until: Option<Timestamp>,
    flush_next_due_at: Option<Timestamp>,
}

impl AwayState {
    fn new(entered_at: Timestamp, config: &SystemConfig) -> Self {
        Self {
            entered_at,
            co2_history: Deque::new(),
            plateau_candidate_since: None,
            plateau_reached: false,
            flush_active_until: None,
            flush_next_due_at: config
                .stale_flush_enabled
                .then(|| entered_at.plus_secs(f64::from(config.stale_flush_interval_secs))),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The ventilation decision engine.  Holds the hysteresis latch and the
/// away-mode ramp state; everything else is read fresh on each decision.
pub struct VentilationEngine {
    /// Occupied-mode hysteresis latch: true while the ERV runs because
    /// CO2 crossed the critical level and has not yet fallen out of the
    /// dead band.
    co2_vent_on: bool,
    away: Option<AwayState>,
    last_speed: FanSpeed,
}

impl VentilationEngine {
    pub fn new() -> Self {
        Self {
            co2_vent_on: false,
            away: None,
            last_speed: FanSpeed::Off,
        }
    }

    /// Speed of the most recent decision.
    pub fn last_speed(&self) -> FanSpeed {
        self.last_speed
    }

    /// Restore the hysteresis latch from a persisted snapshot.
    pub fn restore_hysteresis(&mut self, engaged: bool) {
        self.co2_vent_on = engaged;
    }

    /// Whether the occupied-mode hysteresis latch is engaged.
    pub fn hysteresis_engaged(&self) -> bool {
        self.co2_vent_on
    }

    /// The room went unoccupied: start the two-phase ramp fresh and drop
    /// the occupied-mode latch.
    pub fn begin_away(&mut self, now: Timestamp, config: &SystemConfig) {
        self.co2_vent_on = false;
        self.away = Some(AwayState::new(now, config));
    }

    /// The room is occupied again: away bookkeeping is discarded and the
    /// occupied rule starts from a clean slate.
    pub fn end_away(&mut self) {
        self.co2_vent_on = false;
        self.away = None;
    }

    /// A fresh CO2 sample while away feeds the fall-rate history.
    pub fn record_co2(&mut self, at: Timestamp, ppm: f32) {
        if let Some(away) = &mut self.away {
            if away.co2_history.back().is_some_and(|(prev, _)| at <= *prev) {
                return; // duplicates and reordered samples add no information
            }
            if away.co2_history.is_full() {
                let _ = away.co2_history.pop_front();
            }
            let _ = away.co2_history.push_back((at, ppm));
        }
    }

    /// The door opened: the room is no longer sealed, so the stale-air
    /// flush schedule starts over.
    pub fn note_door_opened(&mut self) {
        if let Some(away) = &mut self.away {
            away.flush_active_until = None;
            away.flush_next_due_at = None;
        }
    }

    /// The door closed again while away: restart the flush countdown.
    pub fn note_door_closed(&mut self, now: Timestamp, config: &SystemConfig) {
        if let Some(away) = &mut self.away {
            if config.stale_flush_enabled && away.flush_next_due_at.is_none() {
                away.flush_next_due_at =
                    Some(now.plus_secs(f64::from(config.stale_flush_interval_secs)));
            }
        }
    }

    /// Next instant the flush schedule changes state — the open window's
    /// end, or the next due time.  Lets the host arm a wake-up so the
    /// flush starts and stops even with no sensor traffic.
    pub fn next_flush_event(&self) -> Option<Timestamp> {
        let away = self.away.as_ref()?;
        away.flush_active_until.or(away.flush_next_due_at)
    }

    /// True while a stale-air flush window is open.
    pub fn flush_active(&self, now: Timestamp) -> bool {
        self.away
            .as_ref()
            .and_then(|a| a.flush_active_until)
            .is_some_and(|until| now < until)
    }

    /// Run the full rule chain and return the current decision.
    pub fn decide(
        &mut self,
        now: Timestamp,
        sensors: &SensorState,
        occupancy: OccupancyState,
        spike: &SpikeDetector,
        override_speed: Option<(FanSpeed, Timestamp)>,
        vent_blocked: bool,
        config: &SystemConfig,
    ) -> VentilationDecision {
        let decision = self.evaluate(
            now,
            sensors,
            occupancy,
            spike,
            override_speed,
            vent_blocked,
            config,
        );
        self.last_speed = decision.speed;
        decision
    }

    // ── Rule chain ────────────────────────────────────────────────

    fn evaluate(
        &mut self,
        now: Timestamp,
        sensors: &SensorState,
        occupancy: OccupancyState,
        spike: &SpikeDetector,
        override_speed: Option<(FanSpeed, Timestamp)>,
        vent_blocked: bool,
        config: &SystemConfig,
    ) -> VentilationDecision {
        // 1. Safety interlock — even an operator override cannot pull
        //    air past an open door or window.
        if vent_blocked {
            return VentilationDecision::new(FanSpeed::Off, "interlock: door or window open");
        }

        // 2. Manual override.
        if let Some((speed, until)) = override_speed {
            let mut d = VentilationDecision::new(speed, format!("manual override ({speed})"));
            d.expires_at = Some(until);
            return d;
        }

        // 3. A resolved spike still clearing out.
        if let Some(peak) = spike.clearing_peak() {
            return VentilationDecision::new(
                FanSpeed::Medium,
                format!("clearing voc spike (peak {peak:.0})"),
            );
        }

        // 4. Absolute tVOC threshold.
        match sensors.tvoc_index {
            Some(v) if v >= config.tvoc_medium_threshold => {
                return VentilationDecision::new(
                    FanSpeed::Medium,
                    format!("tvoc {v:.0} above threshold"),
                );
            }
            Some(_) => {}
            None => debug!("no tvoc reading, absolute threshold rule skipped"),
        }

        // 5/6. CO2 rules split by occupancy.
        match occupancy {
            OccupancyState::Present => self.present_decision(sensors, config),
            OccupancyState::Away => self.away_decision(now, sensors, config),
        }
    }

    /// Occupied: quiet bias.  Only a critical CO2 level turns the fan on,
    /// and the dead band keeps it from chattering near the threshold.
    fn present_decision(
        &mut self,
        sensors: &SensorState,
        config: &SystemConfig,
    ) -> VentilationDecision {
        match sensors.co2_ppm {
            Some(c) if c >= config.co2_critical_ppm => {
                self.co2_vent_on = true;
                VentilationDecision::new(FanSpeed::Quiet, format!("co2 {c:.0} critical"))
            }
            Some(c) if self.co2_vent_on && c >= config.co2_release_ppm() => {
                VentilationDecision::new(
                    FanSpeed::Quiet,
                    format!("co2 {c:.0} still in hysteresis band"),
                )
            }
            Some(c) => {
                self.co2_vent_on = false;
                VentilationDecision::new(FanSpeed::Off, format!("air quality ok (co2 {c:.0})"))
            }
            None => {
                warn!("no co2 reading while occupied; ventilation stays idle");
                VentilationDecision::new(FanSpeed::Off, "insufficient data: no co2 reading")
            }
        }
    }

    /// Away: aggressive refresh.  Phase 1 forces turbo; phase 2 adapts
    /// speed to how fast CO2 is actually falling; a sustained flat rate
    /// means the room reached baseline and ventilation stops.
    fn away_decision(
        &mut self,
        now: Timestamp,
        sensors: &SensorState,
        config: &SystemConfig,
    ) -> VentilationDecision {
        // Normally created on the departure transition; a fresh engine
        // fed an away snapshot starts the ramp here.
        let away = self
            .away
            .get_or_insert_with(|| AwayState::new(now, config));

        let co2_decision = Self::co2_ramp(away, now, sensors, config);

        // The periodic stale-air flush can only raise the speed — a more
        // aggressive CO2-driven choice always stands.
        if let Some(flush) = Self::flush_decision(away, now, config) {
            if flush.speed > co2_decision.speed {
                return flush;
            }
        }
        co2_decision
    }

    fn co2_ramp(
        away: &mut AwayState,
        now: Timestamp,
        sensors: &SensorState,
        config: &SystemConfig,
    ) -> VentilationDecision {
        // Phase 1: forced purge, no questions asked.
        if now.secs_since(away.entered_at) < f64::from(config.away_turbo_secs) {
            return VentilationDecision::new(FanSpeed::Turbo, "away purge (forced)");
        }

        // Phase 2: adapt to the measured fall rate.
        let Some(rate) = Self::fall_rate(&mut away.co2_history, now, config) else {
            // One sample tells us nothing about the trend; keep purging.
            return VentilationDecision::new(FanSpeed::Turbo, "away purge (co2 trend unknown)");
        };

        if rate >= config.rate_quiet_ppm_min {
            away.plateau_candidate_since = None;
            away.plateau_reached = false;
            let (speed, label) = if rate > config.rate_turbo_ppm_min {
                (FanSpeed::Turbo, "fast")
            } else if rate >= config.rate_medium_ppm_min {
                (FanSpeed::Medium, "steady")
            } else {
                (FanSpeed::Quiet, "slow")
            };
            return VentilationDecision::new(
                speed,
                format!("co2 falling {label} ({rate:.1} ppm/min)"),
            );
        }

        // Below the slowest band: plateau candidate.  The measured rate
        // covers the whole trailing window, so the flat stretch dates
        // from the window's oldest sample, not from this event.
        let flat_since = away.co2_history.front().map_or(now, |(at, _)| *at);
        let since = *away.plateau_candidate_since.get_or_insert(flat_since);
        let confirmed = away.plateau_reached
            || now.secs_since(since) >= f64::from(config.plateau_window_secs);
        if !confirmed {
            return VentilationDecision::new(
                FanSpeed::Quiet,
                format!("co2 nearly flat ({rate:.2} ppm/min), watching for plateau"),
            );
        }

        if !away.plateau_reached {
            away.plateau_reached = true;
            match sensors.co2_ppm.filter(|c| *c > config.plateau_floor_ppm) {
                // A stall this high up may mean the trend estimate is
                // lying, not that the room reached outdoor air.
                Some(c) => warn!(
                    "plateau confirmed at {c:.0} ppm, above the {:.0} ppm floor",
                    config.plateau_floor_ppm
                ),
                None => info!("co2 plateau confirmed, stopping ventilation"),
            }
        }
        VentilationDecision::new(FanSpeed::Off, "baseline reached")
    }

    /// Fall rate in ppm/min over the trailing window, positive = falling.
    /// `None` until at least two samples span a non-zero interval.
    fn fall_rate(
        history: &mut Deque<(Timestamp, f32), CO2_HISTORY_SAMPLES>,
        now: Timestamp,
        config: &SystemConfig,
    ) -> Option<f32> {
        let horizon = now.plus_secs(-f64::from(config.co2_history_window_secs));
        while history.front().is_some_and(|(at, _)| *at < horizon) {
            let _ = history.pop_front();
        }

        let (t0, p0) = *history.front()?;
        let (t1, p1) = *history.back()?;
        let minutes = t1.secs_since(t0) / 60.0;
        if minutes <= 0.0 {
            return None;
        }
        Some(((f64::from(p0) - f64::from(p1)) / minutes) as f32)
    }

    fn flush_decision(
        away: &mut AwayState,
        now: Timestamp,
        config: &SystemConfig,
    ) -> Option<VentilationDecision> {
        if !config.stale_flush_enabled {
            return None;
        }

        if let Some(until) = away.flush_active_until {
            if now < until {
                return Some(VentilationDecision::new(
                    FanSpeed::Medium,
                    "periodic stale-air flush",
                ));
            }
            away.flush_active_until = None;
        }

        match away.flush_next_due_at {
            Some(due) if now >= due => {
                away.flush_active_until =
                    Some(now.plus_secs(f64::from(config.stale_flush_duration_secs)));
                away.flush_next_due_at =
                    Some(now.plus_secs(f64::from(config.stale_flush_interval_secs)));
                info!("stale-air flush window opened");
                Some(VentilationDecision::new(
                    FanSpeed::Medium,
                    "periodic stale-air flush",
                ))
            }
            _ => None,
        }
    }
}

impl Default for VentilationEngine {
    fn default() -> Self {
        Self::new()
    }
}
