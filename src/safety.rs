//! Interlock supervisor.
//!
//! Runs on every event **before** the decision engines and accumulates a
//! small bitmask.  The ventilation engine refuses to run the ERV while a
//! contact interlock is raised (pulling conditioned air past an open door
//! or window is wasted work), and the heating coordinator force-resumes
//! heat while the temperature-floor bit is raised.  Interlocks always win
//! over manual overrides.

use log::info;

use crate::config::SystemConfig;
use crate::occupancy::SensorState;

/// Interlock conditions, one bit each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Interlock {
    /// Door contact reports open.
    DoorOpen = 0b0000_0001,
    /// Window contact reports open.
    WindowOpen = 0b0000_0010,
    /// Indoor temperature below the critical floor — heat regardless.
    TempFloor = 0b0000_0100,
}

impl Interlock {
    /// Bitmask for this interlock.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl core::fmt::Display for Interlock {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DoorOpen => write!(f, "door open"),
            Self::WindowOpen => write!(f, "window open"),
            Self::TempFloor => write!(f, "temperature below critical floor"),
        }
    }
}

/// Evaluates interlock conditions into a latched bitmask.
#[derive(Debug, Default)]
pub struct InterlockSupervisor {
    flags: u8,
}

impl InterlockSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate every interlock against the latest sensor state.
    /// Returns the updated bitmask.
    pub fn evaluate(&mut self, sensors: &SensorState, config: &SystemConfig) -> u8 {
        self.eval(Interlock::DoorOpen, sensors.door_open);
        self.eval(Interlock::WindowOpen, sensors.window_open);

        // Unknown temperature never raises or clears the floor bit; the
        // last evaluated state holds until a reading arrives.
        if let Some(temp) = sensors.temp_c {
            self.eval(Interlock::TempFloor, temp < config.critical_floor_temp_c);
        }

        self.flags
    }

    /// True if ventilation must stay off (contact interlock raised).
    pub fn vent_blocked(&self) -> bool {
        self.flags & (Interlock::DoorOpen.mask() | Interlock::WindowOpen.mask()) != 0
    }

    /// True if heating must run regardless of any other rule.
    pub fn heat_forced(&self) -> bool {
        self.flags & Interlock::TempFloor.mask() != 0
    }

    /// Current bitmask.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval(&mut self, interlock: Interlock, condition: bool) {
        if condition {
            if self.flags & interlock.mask() == 0 {
                info!("interlock set: {interlock}");
            }
            self.flags |= interlock.mask();
        } else {
            if self.flags & interlock.mask() != 0 {
                info!("interlock cleared: {interlock}");
            }
            self.flags &= !interlock.mask();
        }
    }
}
