//! Timestamps, the injectable clock, and the keyed timer service.
//!
//! Every duration-sensitive decision in the core is made against
//! timestamps carried by events or passed in by the caller — nothing in
//! here ever sleeps or reads the wall clock implicitly, so tests drive
//! time explicitly without waiting.
//!
//! The timer service keeps **exactly one slot per logical key**:
//! re-arming a key replaces its pending deadline, so the
//! at-most-one-pending-timer guarantee holds by construction and
//! scheduling can never fail.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// A point in time as fractional seconds since the Unix epoch.
///
/// Matches the wire shape every sensor adapter reports (`float` epoch
/// seconds) so no conversion happens at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub f64);

impl Timestamp {
    /// Construct from epoch seconds.
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Epoch seconds.
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// This timestamp shifted forward by `secs`.
    pub fn plus_secs(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }

    /// Seconds elapsed since `earlier`.  Negative if `earlier` is newer.
    pub fn secs_since(self, earlier: Timestamp) -> f64 {
        self.0 - earlier.0
    }

    /// Hour of day (0–23) after applying a fixed UTC offset.
    ///
    /// Good enough for an occupancy-hours gate; the core does not model
    /// DST transitions (the offset is a config value the operator owns).
    pub fn hour_of_day(self, utc_offset_hours: i8) -> u8 {
        let shifted = self.0 + f64::from(utc_offset_hours) * 3600.0;
        let secs_of_day = shifted.rem_euclid(86_400.0);
        (secs_of_day / 3600.0) as u8
    }
}

// ---------------------------------------------------------------------------
// Clock abstraction
// ---------------------------------------------------------------------------

/// Source of "now" for the imperative shell.
///
/// The decision pipeline itself takes explicit `Timestamp` parameters;
/// this trait exists so the host runtime and tests agree on how current
/// time is obtained.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock implementation backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(elapsed.as_secs_f64())
    }
}

// ---------------------------------------------------------------------------
// Timer keys
// ---------------------------------------------------------------------------

/// Identity of every delayed action the core can schedule.
/// Must stay in sync with [`TimerKey::COUNT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TimerKey {
    /// Departure confirmation window after a door open→close sequence.
    DepartureVerification = 0,
    /// Door has been continuously open long enough to enter door-open mode.
    DoorOpenModeEntry = 1,
    /// Inactivity timeout while in door-open mode.
    DoorOpenAway = 2,
    /// Manual ERV override time-to-live expiry.
    ErvOverrideExpiry = 3,
    /// Manual HVAC override time-to-live expiry.
    HvacOverrideExpiry = 4,
    /// Periodic stale-air flush while the room stays closed and empty.
    StaleFlush = 5,
}

impl TimerKey {
    /// Total number of keys — sizes the slot table.
    pub const COUNT: usize = 6;

    /// Convert a slot index back to its key.
    fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::DepartureVerification,
            1 => Self::DoorOpenModeEntry,
            2 => Self::DoorOpenAway,
            3 => Self::ErvOverrideExpiry,
            4 => Self::HvacOverrideExpiry,
            5 => Self::StaleFlush,
            _ => {
                debug_assert!(false, "invalid timer slot index: {idx}");
                Self::StaleFlush
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Timer service
// ---------------------------------------------------------------------------

/// Re-armable one-shot timers, one slot per [`TimerKey`].
///
/// The host runtime calls [`TimerService::pop_due`] before handing each
/// inbound event to the pipeline (and from its periodic tick), so fired
/// timers are processed in-order with a coherent view of state.
#[derive(Debug, Default)]
pub struct TimerService {
    slots: [Option<Timestamp>; TimerKey::COUNT],
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire at `at`, replacing any pending deadline.
    pub fn arm(&mut self, key: TimerKey, at: Timestamp) {
        if let Some(prev) = self.slots[key as usize] {
            log::debug!("timer {key:?} re-armed ({:.1} -> {:.1})", prev.0, at.0);
        } else {
            log::debug!("timer {key:?} armed for {:.1}", at.0);
        }
        self.slots[key as usize] = Some(at);
    }

    /// Cancel any pending deadline for `key`.
    pub fn cancel(&mut self, key: TimerKey) {
        if self.slots[key as usize].take().is_some() {
            log::debug!("timer {key:?} cancelled");
        }
    }

    /// Pending deadline for `key`, if armed.
    pub fn pending(&self, key: TimerKey) -> Option<Timestamp> {
        self.slots[key as usize]
    }

    /// Take the due timer with the earliest deadline, if any.
    ///
    /// Call in a loop to drain everything due at `now`; ties drain in
    /// key order.
    pub fn pop_due(&mut self, now: Timestamp) -> Option<TimerKey> {
        let mut due: Option<(usize, Timestamp)> = None;
        for (idx, slot) in self.slots.iter().enumerate() {
            if let Some(at) = slot {
                if *at <= now && due.map_or(true, |(_, best)| *at < best) {
                    due = Some((idx, *at));
                }
            }
        }
        due.map(|(idx, _)| {
            self.slots[idx] = None;
            TimerKey::from_index(idx)
        })
    }

    /// Earliest pending deadline across all keys (for the host's sleep).
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.slots
            .iter()
            .flatten()
            .copied()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(core::cmp::Ordering::Equal))
    }
}
