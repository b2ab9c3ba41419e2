//! Port traits — the boundary between the decision core and the world.
//!
//! ```text
//!   Adapter ──▶ InboundEvent / Command ──▶ ClimateService ──▶ DecisionSink ──▶ Adapter
//! ```
//!
//! The core emits decisions and never waits on them: device command
//! issuance and persistence are fire-and-forget from its perspective,
//! applied asynchronously by external executors.

use super::events::EngineEvent;

/// The domain emits structured [`EngineEvent`]s through this port.
/// Adapters decide where they go — device executors, the durable
/// decision log, dashboard broadcasts.
pub trait DecisionSink {
    fn emit(&mut self, event: &EngineEvent);
}

/// Forward everything to a closure; handy for small adapters and tests.
impl<F: FnMut(&EngineEvent)> DecisionSink for F {
    fn emit(&mut self, event: &EngineEvent) {
        self(event);
    }
}
