//! Restart snapshot.
//!
//! The little state that must survive a process restart, packed for the
//! external persistence adapter.  Everything else is recomputed from the
//! first events after startup — decisions are idempotent, so a missed
//! event only delays a transition.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::SnapshotError;
use crate::occupancy::OccupancyState;
use crate::vent::FanSpeed;

/// State restored by [`ClimateService::resume_from`](crate::app::service::ClimateService::resume_from).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub occupancy: OccupancyState,
    pub door_open_mode: bool,
    /// Occupied-mode CO2 hysteresis latch.
    pub co2_hysteresis_on: bool,
    pub heating_suspended: bool,
    pub heat_band_paused: bool,
    /// Last commanded ERV speed, so the restart does not re-issue it.
    pub last_fan_speed: FanSpeed,
    pub saved_at: Timestamp,
}

impl PersistedState {
    /// Compact binary encoding for the persistence adapter.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        postcard::to_allocvec(self).map_err(|_| SnapshotError::EncodeFailed)
    }

    /// Decode a stored blob.  Truncated or stale-layout blobs are
    /// rejected rather than half-applied.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        postcard::from_bytes(bytes).map_err(|_| SnapshotError::Corrupted)
    }
}
