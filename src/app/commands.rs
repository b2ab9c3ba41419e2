//! Inbound operator commands.
//!
//! These represent actions requested by the outside world (dashboard,
//! CLI, automation rules) that the
//! [`ClimateService`](super::service::ClimateService) validates **before**
//! anything enters the pipeline — a rejected command leaves no trace.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::config::SystemConfig;
use crate::error::CommandError;
use crate::heating::HvacMode;
use crate::vent::FanSpeed;

/// Control targets an override can claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideTarget {
    Erv,
    Hvac,
}

/// Commands external adapters can send into the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Pin the ERV to a fan speed for a limited time.
    SetErvOverride {
        speed: FanSpeed,
        /// Falls back to the configured default when absent.
        ttl_secs: Option<u32>,
    },
    /// Pin the HVAC unit to a mode (and optional setpoint) for a limited time.
    SetHvacOverride {
        mode: HvacMode,
        setpoint_c: Option<f32>,
        ttl_secs: Option<u32>,
    },
    /// Drop an active override and return the target to automatic control.
    ClearOverride { target: OverrideTarget },
}

/// An accepted, time-limited operator override.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ManualOverride {
    pub target: OverrideTarget,
    pub value: OverrideValue,
    pub set_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ManualOverride {
    pub fn active(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

/// What the override pins its target to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideValue {
    Fan(FanSpeed),
    Hvac {
        mode: HvacMode,
        setpoint_c: Option<f32>,
    },
}

/// Resolve and bound a requested override TTL.
pub fn validate_ttl(requested: Option<u32>, config: &SystemConfig) -> Result<u32, CommandError> {
    let ttl = requested.unwrap_or(config.override_default_ttl_secs);
    if ttl == 0 || ttl > config.override_max_ttl_secs {
        return Err(CommandError::InvalidTtl {
            requested_secs: ttl,
            max_secs: config.override_max_ttl_secs,
        });
    }
    Ok(ttl)
}

/// Reject setpoints no heat pump in a habitable room would accept.
pub fn validate_setpoint(setpoint_c: Option<f32>) -> Result<(), CommandError> {
    if let Some(c) = setpoint_c {
        if !c.is_finite() || !(5.0..=35.0).contains(&c) {
            return Err(CommandError::SetpointOutOfRange(c));
        }
    }
    Ok(())
}
