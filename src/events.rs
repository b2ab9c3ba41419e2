//! Inbound event model.
//!
//! Every signal the core reacts to is one tagged variant here — door and
//! window contacts, motion pulses, workstation activity reports, air
//! quality readings, HVAC status, and timer fires.  Adapters produce
//! these; the single consumer is [`ClimateService`](crate::app::service::ClimateService).
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌─────────────────┐
//! │ MQTT adapter │────▶│               │     │                 │
//! │ HTTP adapter │────▶│  EventQueue   │────▶│  ClimateService │
//! │ Timer fires  │────▶│  (bounded)    │     │  (one writer)   │
//! └──────────────┘     └───────────────┘     └─────────────────┘
//! ```
//!
//! Concurrent producers hand events to the one pipeline through the
//! bounded [`EventQueue`]; state is never touched from adapter context.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use serde::{Deserialize, Serialize};

use crate::clock::{Timestamp, TimerKey};
use crate::error::EventError;
use crate::heating::HvacMode;

/// Maximum number of queued events awaiting the pipeline.
pub const EVENT_QUEUE_CAP: usize = 32;

/// Bounded hand-off channel between adapters and the event pipeline.
pub type EventQueue = Channel<CriticalSectionRawMutex, InboundEvent, EVENT_QUEUE_CAP>;

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Everything the decision core can be fed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Door contact changed.
    Door { open: bool, at: Timestamp },
    /// Window contact changed.
    Window { open: bool, at: Timestamp },
    /// Motion sensor pulse.
    Motion { at: Timestamp },
    /// Workstation activity report.
    Activity {
        last_active: Timestamp,
        external_monitor: bool,
    },
    /// Air-quality reading; any subset of fields may be present.
    AirQuality(AirQualityReading),
    /// HVAC unit status as observed by its adapter.
    HvacStatus { mode: HvacMode },
    /// A scheduled timer came due.
    TimerFired { key: TimerKey },
}

/// One air-monitor sample.  Absent fields are readings the device did not
/// report in this frame, not zeroes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirQualityReading {
    pub co2_ppm: Option<f32>,
    pub tvoc_index: Option<f32>,
    pub temp_c: Option<f32>,
    pub humidity: Option<f32>,
    pub at: Timestamp,
}

impl InboundEvent {
    /// Timestamp carried by the event, if it has one.
    pub fn timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Door { at, .. }
            | Self::Window { at, .. }
            | Self::Motion { at }
            | Self::Activity {
                last_active: at, ..
            } => Some(*at),
            Self::AirQuality(r) => Some(r.at),
            Self::HvacStatus { .. } | Self::TimerFired { .. } => None,
        }
    }

    /// Reject events a broken adapter could produce (NaN/inf payloads).
    /// Runs before the pipeline so garbage never reaches state.
    pub fn validate(&self) -> Result<(), EventError> {
        if let Some(at) = self.timestamp() {
            if !at.as_secs().is_finite() {
                return Err(EventError::InvalidTimestamp);
            }
        }
        if let Self::AirQuality(r) = self {
            let finite = |v: Option<f32>| v.is_none_or(f32::is_finite);
            if !(finite(r.co2_ppm) && finite(r.tvoc_index) && finite(r.temp_c) && finite(r.humidity))
            {
                return Err(EventError::NonFiniteReading);
            }
        }
        Ok(())
    }
}
