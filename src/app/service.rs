//! Application service — the single-writer event pipeline.
//!
//! [`ClimateService`] owns every piece of mutable state (sensor state,
//! occupancy model, spike tracker, away ramp, overrides, timers) and
//! processes one inbound event at a time:
//!
//! ```text
//!  event ──▶ occupancy ──▶ spike ──▶ interlocks ──▶ vent ──▶ heating
//!                                                     │          │
//!                                                     ▼          ▼
//!                                                  DecisionSink emits
//! ```
//!
//! Due timers are drained *before* each event so a fired timer observes
//! state exactly as it was at its deadline, never interleaved with the
//! triggering event.  Decisions are recomputed from scratch every time
//! and emitted only when they change, so replays and missed events can
//! only delay a transition, never corrupt one.

use log::info;

use crate::clock::{TimerKey, TimerService, Timestamp};
use crate::config::SystemConfig;
use crate::error::Result;
use crate::events::InboundEvent;
use crate::heating::{HeatingCoordinator, HvacMode};
use crate::occupancy::{OccupancyChange, OccupancyState, OccupancyTracker};
use crate::safety::InterlockSupervisor;
use crate::snapshot::PersistedState;
use crate::spike::{SpikeDetector, SpikeSignal};
use crate::vent::{FanSpeed, VentilationEngine};

use super::commands::{
    validate_setpoint, validate_ttl, Command, ManualOverride, OverrideTarget, OverrideValue,
};
use super::events::{EngineEvent, StatusSnapshot};
use super::ports::DecisionSink;

/// The decision core.  One instance, one writer, no locks.
pub struct ClimateService {
    config: SystemConfig,
    occupancy: OccupancyTracker,
    spike: SpikeDetector,
    vent: VentilationEngine,
    heating: HeatingCoordinator,
    interlock: InterlockSupervisor,
    timers: TimerService,
    erv_override: Option<ManualOverride>,
    hvac_override: Option<ManualOverride>,
    hvac_mode: HvacMode,
    /// Speed of the last *emitted* ventilation decision.
    last_emitted_speed: Option<FanSpeed>,
    events_processed: u64,
}

impl ClimateService {
    /// Construct the service.  `initial` is the externally restored
    /// occupancy value; use [`resume_from`](Self::resume_from) when a
    /// full snapshot is available.
    pub fn new(config: SystemConfig, initial: OccupancyState, now: Timestamp) -> Self {
        Self {
            occupancy: OccupancyTracker::new(initial, now),
            spike: SpikeDetector::new(),
            vent: VentilationEngine::new(),
            heating: HeatingCoordinator::new(),
            interlock: InterlockSupervisor::new(),
            timers: TimerService::new(),
            erv_override: None,
            hvac_override: None,
            hvac_mode: HvacMode::Heat,
            last_emitted_speed: None,
            events_processed: 0,
            config,
        }
    }

    /// Re-apply a persisted snapshot after a restart.
    pub fn resume_from(&mut self, state: &PersistedState, now: Timestamp) {
        self.occupancy.restore(
            state.occupancy,
            state.door_open_mode,
            now,
            &mut self.timers,
            &self.config,
        );
        self.vent.restore_hysteresis(state.co2_hysteresis_on);
        self.heating
            .restore(state.heating_suspended, state.heat_band_paused);
        self.last_emitted_speed = Some(state.last_fan_speed);
        info!("service resumed from snapshot saved at {:.0}", state.saved_at.0);
    }

    /// Capture the state worth persisting.
    pub fn capture(&self, now: Timestamp) -> PersistedState {
        PersistedState {
            occupancy: self.occupancy.state(),
            door_open_mode: self.occupancy.door_open_mode(),
            co2_hysteresis_on: self.vent.hysteresis_engaged(),
            heating_suspended: self.heating.away_suspended(),
            heat_band_paused: self.heating.band_paused(),
            last_fan_speed: self.last_emitted_speed.unwrap_or(FanSpeed::Off),
            saved_at: now,
        }
    }

    // ── Event intake ──────────────────────────────────────────────

    /// Feed one inbound event through the pipeline.
    pub fn handle_event(
        &mut self,
        now: Timestamp,
        event: InboundEvent,
        sink: &mut impl DecisionSink,
    ) -> Result<()> {
        event.validate()?;
        self.drain_due_timers(now, sink);
        self.apply(now, event, sink);
        Ok(())
    }

    /// Periodic heartbeat from the host: fire anything that came due.
    pub fn tick(&mut self, now: Timestamp, sink: &mut impl DecisionSink) {
        self.drain_due_timers(now, sink);
    }

    /// Validate and apply an operator command.
    pub fn handle_command(
        &mut self,
        now: Timestamp,
        command: Command,
        sink: &mut impl DecisionSink,
    ) -> Result<()> {
        match command {
            Command::SetErvOverride { speed, ttl_secs } => {
                let ttl = validate_ttl(ttl_secs, &self.config)?;
                let expires_at = now.plus_secs(f64::from(ttl));
                self.erv_override = Some(ManualOverride {
                    target: OverrideTarget::Erv,
                    value: OverrideValue::Fan(speed),
                    set_at: now,
                    expires_at,
                });
                self.timers.arm(TimerKey::ErvOverrideExpiry, expires_at);
                info!("erv override: {speed} for {ttl}s");
            }
            Command::SetHvacOverride {
                mode,
                setpoint_c,
                ttl_secs,
            } => {
                validate_setpoint(setpoint_c)?;
                let ttl = validate_ttl(ttl_secs, &self.config)?;
                let expires_at = now.plus_secs(f64::from(ttl));
                self.hvac_override = Some(ManualOverride {
                    target: OverrideTarget::Hvac,
                    value: OverrideValue::Hvac { mode, setpoint_c },
                    set_at: now,
                    expires_at,
                });
                self.timers.arm(TimerKey::HvacOverrideExpiry, expires_at);
                info!("hvac override: {mode:?} for {ttl}s");
            }
            Command::ClearOverride { target } => {
                let slot = match target {
                    OverrideTarget::Erv => &mut self.erv_override,
                    OverrideTarget::Hvac => &mut self.hvac_override,
                };
                if slot.take().is_none() {
                    return Err(crate::error::CommandError::NoActiveOverride.into());
                }
                self.timers.cancel(match target {
                    OverrideTarget::Erv => TimerKey::ErvOverrideExpiry,
                    OverrideTarget::Hvac => TimerKey::HvacOverrideExpiry,
                });
                info!("override cleared for {target:?}");
            }
        }
        self.reevaluate(now, sink);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────

    pub fn occupancy(&self) -> OccupancyState {
        self.occupancy.state()
    }

    pub fn fan_speed(&self) -> FanSpeed {
        self.last_emitted_speed.unwrap_or(FanSpeed::Off)
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Earliest pending timer deadline, for the host's sleep interval.
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.timers.next_deadline()
    }

    /// The active HVAC override, if any.  The commanding adapter applies
    /// its pinned mode/setpoint to the device; the core only stops
    /// issuing automatic heating decisions for the duration.
    pub fn hvac_override(&self, now: Timestamp) -> Option<&ManualOverride> {
        self.hvac_override.as_ref().filter(|o| o.active(now))
    }

    /// Status summary for the dashboard adapter.
    pub fn status(&self, now: Timestamp) -> StatusSnapshot {
        let sensors = self.occupancy.sensors();
        StatusSnapshot {
            occupancy: self.occupancy.state(),
            door_open_mode: self.occupancy.door_open_mode(),
            door_open: sensors.door_open,
            window_open: sensors.window_open,
            co2_ppm: sensors.co2_ppm,
            tvoc_index: sensors.tvoc_index,
            temp_c: sensors.temp_c,
            humidity: sensors.humidity,
            fan_speed: self.fan_speed(),
            spike_phase: self.spike.phase(),
            heating_suspended: self.heating.suspended(),
            erv_override_active: self.erv_override.is_some_and(|o| o.active(now)),
            hvac_override_active: self.hvac_override.is_some_and(|o| o.active(now)),
            interlock_flags: self.interlock.flags(),
            events_processed: self.events_processed,
        }
    }

    // ── Internal ──────────────────────────────────────────────────

    fn drain_due_timers(&mut self, now: Timestamp, sink: &mut impl DecisionSink) {
        while let Some(key) = self.timers.pop_due(now) {
            self.apply(now, InboundEvent::TimerFired { key }, sink);
        }
    }

    fn apply(&mut self, now: Timestamp, event: InboundEvent, sink: &mut impl DecisionSink) {
        self.events_processed += 1;

        match event {
            InboundEvent::Door { open, at } => {
                let change =
                    self.occupancy
                        .handle_door(open, at, &mut self.timers, &self.config);
                if open {
                    self.vent.note_door_opened();
                } else if self.occupancy.state() == OccupancyState::Away {
                    self.vent.note_door_closed(at, &self.config);
                }
                self.after_occupancy_change(change, sink);
            }
            InboundEvent::Window { open, at } => {
                self.occupancy.handle_window(open, at);
            }
            InboundEvent::Motion { at } => {
                let change = self
                    .occupancy
                    .handle_motion(at, &mut self.timers, &self.config);
                self.after_occupancy_change(change, sink);
            }
            InboundEvent::Activity {
                last_active,
                external_monitor,
            } => {
                let change = self.occupancy.handle_activity(
                    last_active,
                    external_monitor,
                    &mut self.timers,
                    &self.config,
                );
                self.after_occupancy_change(change, sink);
            }
            InboundEvent::AirQuality(reading) => {
                if self.occupancy.update_air(&reading) {
                    if self.occupancy.state() == OccupancyState::Away {
                        if let Some(co2) = reading.co2_ppm {
                            self.vent.record_co2(reading.at, co2);
                        }
                    }
                    if let Some(tvoc) = reading.tvoc_index {
                        if let Some(SpikeSignal::Resolved { peak }) =
                            self.spike.on_reading(now, tvoc, &self.config)
                        {
                            sink.emit(&EngineEvent::SpikeResolved { at: now, peak });
                        }
                    }
                }
            }
            InboundEvent::HvacStatus { mode } => {
                self.hvac_mode = mode;
            }
            InboundEvent::TimerFired { key } => match key {
                TimerKey::DepartureVerification
                | TimerKey::DoorOpenModeEntry
                | TimerKey::DoorOpenAway => {
                    let change =
                        self.occupancy
                            .handle_timer(key, now, &mut self.timers, &self.config);
                    self.after_occupancy_change(change, sink);
                }
                TimerKey::ErvOverrideExpiry => {
                    if self.erv_override.take().is_some() {
                        info!("erv override expired, back to automatic control");
                    }
                }
                TimerKey::HvacOverrideExpiry => {
                    if self.hvac_override.take().is_some() {
                        info!("hvac override expired, back to automatic control");
                    }
                }
                // Nothing to mutate: the re-evaluation below reads the
                // flush schedule off the wall clock.
                TimerKey::StaleFlush => {}
            },
        }

        self.reevaluate(now, sink);
    }

    fn after_occupancy_change(
        &mut self,
        change: Option<OccupancyChange>,
        sink: &mut impl DecisionSink,
    ) {
        let Some(change) = change else { return };
        sink.emit(&EngineEvent::Occupancy(change));

        match (change.from, change.to) {
            (OccupancyState::Present, OccupancyState::Away) => {
                // Departure: fresh purge ramp, fresh spike window.
                self.spike.reset();
                self.vent.begin_away(change.at, &self.config);
            }
            (OccupancyState::Away, OccupancyState::Present) => {
                self.vent.end_away();
                self.timers.cancel(TimerKey::StaleFlush);
            }
            _ => {}
        }
    }

    /// Re-run the decision chain and emit whatever changed.
    fn reevaluate(&mut self, now: Timestamp, sink: &mut impl DecisionSink) {
        self.interlock
            .evaluate(self.occupancy.sensors(), &self.config);

        let erv_override = match self.erv_override {
            Some(ov) if ov.active(now) => match ov.value {
                OverrideValue::Fan(speed) => Some((speed, ov.expires_at)),
                OverrideValue::Hvac { .. } => None,
            },
            _ => None,
        };

        let decision = self.vent.decide(
            now,
            self.occupancy.sensors(),
            self.occupancy.state(),
            &self.spike,
            erv_override,
            self.interlock.vent_blocked(),
            &self.config,
        );

        // Keep the flush timer tracking the engine's schedule so the
        // window opens and closes even during a quiet stretch.  Past
        // deadlines (schedule held back by an interlock) are not
        // re-armed; the next decision picks them up directly.
        if self.occupancy.state() == OccupancyState::Away {
            if let Some(at) = self.vent.next_flush_event() {
                if at > now && self.timers.pending(TimerKey::StaleFlush) != Some(at) {
                    self.timers.arm(TimerKey::StaleFlush, at);
                }
            }
        }

        let speed = decision.speed;
        if self.last_emitted_speed != Some(speed) {
            sink.emit(&EngineEvent::Ventilation { at: now, decision });
            self.last_emitted_speed = Some(speed);
        }

        let hvac_override_active = self.hvac_override.is_some_and(|o| o.active(now));
        let hour = now.hour_of_day(self.config.utc_offset_hours);
        if let Some(decision) = self.heating.evaluate(
            self.occupancy.state(),
            speed,
            self.occupancy.sensors().temp_c,
            self.hvac_mode,
            hour,
            self.interlock.heat_forced(),
            hvac_override_active,
            &self.config,
        ) {
            sink.emit(&EngineEvent::Heating { at: now, decision });
        }
    }
}
