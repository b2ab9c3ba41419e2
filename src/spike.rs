//! VOC spike detector.
//!
//! Watches the tVOC index for rapid rises **relative to a trailing
//! baseline** so that transient odor events (cooking, cleaning agents)
//! are caught even when their absolute level never crosses the hard
//! ventilation threshold.
//!
//! Three-phase lifecycle:
//!
//! ```text
//!  IDLE ──[value ≥ baseline + delta]──▶ BUILDING (tracking peak)
//!                                          │
//!                            [2 declines, peak high enough]
//!                                          ▼
//!  IDLE ◀──[value < clear target]────── CLEARING (cooldown armed)
//! ```
//!
//! A spike whose peak never reached the minimum is abandoned without a
//! cooldown — short blips from the AC filter kicking in are not odor
//! events.

use heapless::Deque;
use log::{debug, info};
use serde::Serialize;

use crate::clock::Timestamp;
use crate::config::SystemConfig;

/// Ring-buffer capacity for recent tVOC samples.
pub const VOC_WINDOW_SAMPLES: usize = 15;

/// Where the detector is in the spike lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikePhase {
    /// No spike in progress.
    Idle,
    /// A spike was armed and its peak is being tracked.
    Building,
    /// The spike resolved; ventilation is clearing the residue.
    Clearing,
}

/// Signals handed to the caller as the lifecycle advances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpikeSignal {
    /// A spike was armed.
    Started { value: f32, baseline: f32 },
    /// Decline confirmed — the event is over, clearing begins.
    Resolved { peak: f32 },
    /// The index fell back below the clear target.
    Cleared { value: f32 },
}

/// Sliding-window baseline tracker with peak/decline bookkeeping.
pub struct SpikeDetector {
    ring: Deque<f32, VOC_WINDOW_SAMPLES>,
    phase: SpikePhase,
    peak: f32,
    decline_count: u8,
    cooldown_until: Option<Timestamp>,
}

impl SpikeDetector {
    pub fn new() -> Self {
        Self {
            ring: Deque::new(),
            phase: SpikePhase::Idle,
            peak: 0.0,
            decline_count: 0,
            cooldown_until: None,
        }
    }

    pub fn phase(&self) -> SpikePhase {
        self.phase
    }

    /// True while a resolved spike is still being ventilated away.
    pub fn is_clearing(&self) -> bool {
        self.phase == SpikePhase::Clearing
    }

    /// Peak of the spike currently clearing.
    pub fn clearing_peak(&self) -> Option<f32> {
        self.is_clearing().then_some(self.peak)
    }

    pub fn cooldown_until(&self) -> Option<Timestamp> {
        self.cooldown_until
    }

    /// Feed one tVOC sample.  Returns a signal when the lifecycle moves.
    pub fn on_reading(
        &mut self,
        now: Timestamp,
        value: f32,
        config: &SystemConfig,
    ) -> Option<SpikeSignal> {
        // Baseline over the oldest buffered samples, computed before this
        // reading enters the buffer so a rising edge cannot lift its own
        // reference.
        let k = config.voc_baseline_samples;
        let baseline = (self.ring.len() >= k)
            .then(|| self.ring.iter().take(k).sum::<f32>() / k as f32);

        if self.ring.is_full() {
            let _ = self.ring.pop_front();
        }
        // Capacity just freed above; push cannot fail.
        let _ = self.ring.push_back(value);

        match self.phase {
            SpikePhase::Idle => {
                let Some(baseline) = baseline else {
                    return None; // Still warming up.
                };
                if self.in_cooldown(now) {
                    return None;
                }
                if value - baseline >= config.spike_delta && value >= config.spike_min_trigger {
                    self.phase = SpikePhase::Building;
                    self.peak = value;
                    self.decline_count = 0;
                    info!("voc spike armed at {value:.0} (baseline {baseline:.0})");
                    return Some(SpikeSignal::Started { value, baseline });
                }
                None
            }

            SpikePhase::Building => {
                if value > self.peak {
                    self.peak = value;
                    self.decline_count = 0;
                    return None;
                }
                self.decline_count += 1;
                if self.decline_count < 2 {
                    return None;
                }
                if self.peak >= config.spike_min_peak {
                    self.cooldown_until =
                        Some(now.plus_secs(f64::from(config.spike_cooldown_secs)));
                    self.phase = SpikePhase::Clearing;
                    info!("voc spike resolved, peak {:.0}, clearing", self.peak);
                    return Some(SpikeSignal::Resolved { peak: self.peak });
                }
                // Peak never amounted to anything — false alarm.
                debug!("voc spike abandoned, peak {:.0} below minimum", self.peak);
                self.phase = SpikePhase::Idle;
                self.peak = 0.0;
                self.decline_count = 0;
                None
            }

            SpikePhase::Clearing => {
                if value < config.spike_clear_target {
                    info!("voc spike cleared at {value:.0}");
                    self.phase = SpikePhase::Idle;
                    self.peak = 0.0;
                    self.decline_count = 0;
                    return Some(SpikeSignal::Cleared { value });
                }
                None
            }
        }
    }

    /// Discard buffered samples and any in-flight spike.  The cooldown
    /// survives: it is a wall-clock suppression, not buffered history.
    pub fn reset(&mut self) {
        self.ring.clear();
        self.phase = SpikePhase::Idle;
        self.peak = 0.0;
        self.decline_count = 0;
    }

    fn in_cooldown(&self, now: Timestamp) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }
}

impl Default for SpikeDetector {
    fn default() -> Self {
        Self::new()
    }
}
