//! System configuration parameters
//!
//! All tunable thresholds and durations for the climate decision core.
//! Adapters may override values at startup (e.g. from a YAML file); the
//! defaults below are the ones the room has been tuned with.

use serde::{Deserialize, Serialize};

use crate::heating::OccupancyHours;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Occupancy ---
    /// Continuous door-open duration before door-open mode engages (seconds)
    pub door_open_mode_entry_secs: u32,
    /// Quiet window after a door open→close sequence that confirms departure (seconds)
    pub departure_verification_secs: u32,
    /// Inactivity timeout that confirms departure while in door-open mode (seconds)
    pub door_open_away_timeout_secs: u32,

    // --- CO2 thresholds ---
    /// CO2 level (ppm) that turns the ERV on while the room is occupied
    pub co2_critical_ppm: f32,
    /// Width of the dead band below the critical level; once running, the
    /// ERV only stops below `co2_critical_ppm - co2_hysteresis_ppm`
    pub co2_hysteresis_ppm: f32,

    // --- Away ventilation ramp ---
    /// Forced-turbo duration after the room goes unoccupied (seconds)
    pub away_turbo_secs: u32,
    /// Trailing window used for the CO2 fall-rate estimate (seconds)
    pub co2_history_window_secs: u32,
    /// Fall rate (ppm/min) above which turbo is kept
    pub rate_turbo_ppm_min: f32,
    /// Fall rate (ppm/min) above which medium is kept
    pub rate_medium_ppm_min: f32,
    /// Fall rate (ppm/min) above which quiet is kept; below is a plateau candidate
    pub rate_quiet_ppm_min: f32,
    /// Sustained sub-quiet-rate duration that confirms a plateau (seconds)
    pub plateau_window_secs: u32,
    /// CO2 level (ppm) above which a flat rate is treated as a stall, not a plateau
    pub plateau_floor_ppm: f32,

    // --- VOC ---
    /// Absolute tVOC index that triggers medium ventilation
    pub tvoc_medium_threshold: f32,
    /// Oldest-sample count averaged into the spike baseline
    pub voc_baseline_samples: usize,
    /// Rise above baseline that arms a spike
    pub spike_delta: f32,
    /// Minimum absolute value a reading must reach to arm a spike
    pub spike_min_trigger: f32,
    /// Minimum peak for a resolved spike; below this the spike is a false alarm
    pub spike_min_peak: f32,
    /// tVOC index below which a clearing spike is considered fully resolved
    pub spike_clear_target: f32,
    /// Suppression window after a resolved spike (seconds)
    pub spike_cooldown_secs: u32,

    // --- Stale-air flush (away) ---
    /// Enable the periodic flush while the room stays closed and empty
    pub stale_flush_enabled: bool,
    /// Interval between flushes (seconds)
    pub stale_flush_interval_secs: u32,
    /// Duration of each flush (seconds)
    pub stale_flush_duration_secs: u32,

    // --- Manual override ---
    /// Default override time-to-live when the command does not carry one (seconds)
    pub override_default_ttl_secs: u32,
    /// Upper bound on any override time-to-live (seconds)
    pub override_max_ttl_secs: u32,

    // --- Heating ---
    /// Indoor temperature (°C) above which heating may be suspended while
    /// the room is unoccupied and the ERV is running
    pub min_heat_suspend_temp_c: f32,
    /// Indoor temperature (°C) below which heating always runs
    pub critical_floor_temp_c: f32,
    /// Comfort band: pause heat at or above this temperature (°C)
    pub heat_off_temp_c: f32,
    /// Comfort band: resume heat at or below this temperature (°C)
    pub heat_on_temp_c: f32,
    /// Hours during which automatic heat resumption is allowed
    pub occupancy_hours: OccupancyHours,
    /// Fixed UTC offset used to derive the local hour of day
    pub utc_offset_hours: i8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Occupancy
            door_open_mode_entry_secs: 300, // 5 min
            departure_verification_secs: 10,
            door_open_away_timeout_secs: 300, // 5 min

            // CO2
            co2_critical_ppm: 2000.0,
            co2_hysteresis_ppm: 200.0, // off below 1800

            // Away ramp
            away_turbo_secs: 1800,        // 30 min
            co2_history_window_secs: 900, // 15 min
            rate_turbo_ppm_min: 8.0,
            rate_medium_ppm_min: 2.0,
            rate_quiet_ppm_min: 0.5,
            plateau_window_secs: 600, // 10 min
            plateau_floor_ppm: 600.0,

            // VOC
            tvoc_medium_threshold: 250.0,
            voc_baseline_samples: 5,
            spike_delta: 80.0,
            spike_min_trigger: 150.0,
            spike_min_peak: 200.0,
            spike_clear_target: 120.0,
            spike_cooldown_secs: 7200, // 2 h

            // Stale flush
            stale_flush_enabled: true,
            stale_flush_interval_secs: 8 * 3600,
            stale_flush_duration_secs: 30 * 60,

            // Manual override
            override_default_ttl_secs: 30 * 60,
            override_max_ttl_secs: 24 * 3600,

            // Heating
            min_heat_suspend_temp_c: 20.0,
            critical_floor_temp_c: 15.0,
            heat_off_temp_c: 24.0,
            heat_on_temp_c: 21.5,
            occupancy_hours: OccupancyHours {
                start_hour: 8,
                end_hour: 22,
            },
            utc_offset_hours: 0,
        }
    }
}

impl SystemConfig {
    /// CO2 level below which a running occupied-mode ERV turns off.
    pub fn co2_release_ppm(&self) -> f32 {
        self.co2_critical_ppm - self.co2_hysteresis_ppm
    }
}
